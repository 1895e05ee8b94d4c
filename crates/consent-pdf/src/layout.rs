//! Text insertion points on the consent template
//!
//! Coordinates use a top-left origin in PDF points, as measured on the
//! printed form. [`Point::to_pdf`] converts to PDF user space.

use consent_core::{Authorization, SubmissionRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Flip to PDF user space (bottom-left origin) on a page of `page_height`
    pub fn to_pdf(self, page_height: f32) -> (f32, f32) {
        (self.x, page_height - self.y)
    }
}

/// Axis-aligned box, top-left origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Largest box with `aspect` (width / height) centred inside this one,
    /// as `(x, y, width, height)` in PDF user space
    pub fn fit(&self, aspect: f32, page_height: f32) -> (f32, f32, f32, f32) {
        let (mut w, mut h) = (self.width(), self.height());
        if aspect > 0.0 {
            if w / h > aspect {
                w = h * aspect;
            } else {
                h = w / aspect;
            }
        }
        let x = self.left + (self.width() - w) / 2.0;
        let top = self.top + (self.height() - h) / 2.0;
        (x, page_height - top - h, w, h)
    }
}

/// Every value the template prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateField {
    PatientName,
    DateOfBirth,
    Address,
    City,
    State,
    ZipCode,
    Email,
    Phone,
    Diagnosis,
    SignatureDate,
    AuthorizedPerson,
    VerbalAuthorization,
    VerbalAuthDate,
    EmployeeName,
}

impl TemplateField {
    /// Text printed for this field; empty when the record has no value
    pub fn value(&self, record: &SubmissionRecord) -> String {
        let patient = &record.patient;
        match self {
            TemplateField::PatientName => patient.full_name(),
            TemplateField::DateOfBirth => patient.date_of_birth.clone(),
            TemplateField::Address => patient.address.clone(),
            TemplateField::City => patient.city.clone(),
            TemplateField::State => patient.state.clone(),
            TemplateField::ZipCode => patient.zip_code.clone(),
            TemplateField::Email => patient.email.clone(),
            TemplateField::Phone => patient.phone.clone(),
            TemplateField::Diagnosis => record.case_topic.clone(),
            TemplateField::SignatureDate => record
                .authorization
                .signature_date()
                .unwrap_or_default()
                .to_string(),
            TemplateField::AuthorizedPerson => {
                record.authorized_person.clone().unwrap_or_default()
            }
            TemplateField::VerbalAuthorization => match record.authorization {
                Authorization::Verbal { .. } => "Yes".to_string(),
                Authorization::Signed { .. } => String::new(),
            },
            TemplateField::VerbalAuthDate => record
                .authorization
                .verbal_auth_date()
                .unwrap_or_default()
                .to_string(),
            TemplateField::EmployeeName => record.employee.full_name(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub font_size: f32,
    pub fields: Vec<(TemplateField, Point)>,
    pub signature: Rect,
}

impl Default for FieldLayout {
    fn default() -> Self {
        Self::case_study_consent()
    }
}

impl FieldLayout {
    /// Insertion points of the case study consent form, first page
    pub fn case_study_consent() -> Self {
        use TemplateField::*;
        Self {
            font_size: 10.0,
            fields: vec![
                (PatientName, Point::new(118.0, 240.0)),
                (DateOfBirth, Point::new(450.0, 240.0)),
                (Address, Point::new(95.0, 258.0)),
                (City, Point::new(300.0, 258.0)),
                (State, Point::new(435.0, 258.0)),
                (ZipCode, Point::new(495.0, 258.0)),
                (Email, Point::new(90.0, 275.0)),
                (Phone, Point::new(355.0, 275.0)),
                (Diagnosis, Point::new(140.0, 400.0)),
                (SignatureDate, Point::new(300.0, 615.0)),
                (AuthorizedPerson, Point::new(70.0, 650.0)),
                (VerbalAuthorization, Point::new(200.0, 685.0)),
                (VerbalAuthDate, Point::new(265.0, 685.0)),
                (EmployeeName, Point::new(360.0, 720.0)),
            ],
            signature: Rect::new(70.0, 600.0, 225.0, 630.0),
        }
    }

    pub fn position(&self, field: TemplateField) -> Option<Point> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, p)| *p)
    }
}
