//! Submission builder
//!
//! Turns a raw [`IntakeForm`] into a [`SubmissionRecord`]. A record only
//! exists once every field rule passes and the authorization evidence is
//! unambiguous.

use chrono::NaiveDate;

use crate::error::BuildError;
use crate::form::IntakeForm;
use crate::record::{
    Authorization, EmployeeIdentity, PatientIdentity, SubmissionRecord,
};
use crate::signature;
use crate::validation::{self, ValidationRules};
use crate::DATE_FORMAT;

#[derive(Debug, Clone, Default)]
pub struct SubmissionBuilder {
    rules: ValidationRules,
}

impl SubmissionBuilder {
    pub fn new(rules: ValidationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Validate `form` and assemble a record dated `today`
    ///
    /// A blank canvas sent alongside verbal authorization is treated as no
    /// signature; an inked canvas plus verbal authorization is rejected.
    pub fn build(
        &self,
        form: &IntakeForm,
        today: NaiveDate,
    ) -> Result<SubmissionRecord, BuildError> {
        validation::validate_form(form, &self.rules, today)?;

        let drawn = form
            .signature_png()
            .map_err(|e| BuildError::InvalidSignature(e.to_string()))?
            .filter(|image| signature::has_ink(image));

        let stamped = today.format(DATE_FORMAT).to_string();
        let authorization = match (drawn, form.verbal_authorization) {
            (Some(_), true) => return Err(BuildError::AmbiguousAuthorization),
            (None, false) => return Err(BuildError::MissingAuthorization),
            (Some(image), false) => Authorization::Signed {
                image,
                signature_date: stamped,
            },
            (None, true) => Authorization::Verbal { auth_date: stamped },
        };

        let date_of_birth = validation::parse_date_of_birth(&form.date_of_birth)
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| form.date_of_birth.trim().to_string());

        Ok(SubmissionRecord {
            patient: PatientIdentity {
                first_name: form.first_name.trim().to_string(),
                last_name: form.last_name.trim().to_string(),
                date_of_birth,
                email: form.email.trim().to_string(),
                phone: form.phone.trim().to_string(),
                address: form.address.trim().to_string(),
                city: form.city.trim().to_string(),
                state: form.state.trim().to_string(),
                zip_code: form.zip_code.trim().to_string(),
            },
            medical_record_number: form.medical_record_number.trim().to_string(),
            authorization,
            authorized_person: form
                .authorized_person
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            employee: EmployeeIdentity {
                first_name: form.employee_first_name.trim().to_string(),
                last_name: form.employee_last_name.trim().to_string(),
                email: form.employee_email.trim().to_string(),
                department: form.employee_department.trim().to_string(),
            },
            case_topic: form.case_study_diagnosis.trim().to_string(),
            submitted_at: None,
        })
    }
}
