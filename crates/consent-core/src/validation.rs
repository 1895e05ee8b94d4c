//! Intake form field rules
//!
//! Each rule returns a [`FieldCheck`] so the client can show every failing
//! field at once. [`validate_form`] runs the full rule set for one form.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{FieldError, ValidationError};
use crate::form::IntakeForm;
use crate::signature;
use crate::DATE_FORMAT;

/// Organisation domain employee emails must belong to
pub const DEFAULT_EMPLOYEE_EMAIL_DOMAIN: &str = "samc.com";

const DIAGNOSIS_MAX_LEN: usize = 100;
const NAME_MIN_LEN: usize = 2;
const ADDRESS_MIN_LEN: usize = 5;

lazy_static! {
    static ref NAME_PATTERN: Regex = Regex::new(r"^[A-Za-z\s-]+$").unwrap();
    static ref DIAGNOSIS_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9\s.-]+$").unwrap();
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    static ref EMAIL_LOCAL_PART: Regex = Regex::new(r"^[a-zA-Z0-9._%+-]+$").unwrap();
    static ref PHONE_PATTERN: Regex =
        Regex::new(r"^\(?([0-9]{3})\)?[-. ]?([0-9]{3})[-. ]?([0-9]{4})$").unwrap();
    static ref CITY_PATTERN: Regex = Regex::new(r"^[A-Za-z]+(?:[ -][A-Za-z]+)*$").unwrap();
    static ref ZIP_PATTERN: Regex = Regex::new(r"^\d{5}(-\d{4})?$").unwrap();
}

/// USPS codes and names of the states the form accepts
pub const STATES: [(&str, &str); 50] = [
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// Full state name for a USPS code
pub fn state_name(code: &str) -> Option<&'static str> {
    STATES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Outcome of a single field rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCheck {
    pub valid: bool,
    pub message: String,
}

impl FieldCheck {
    fn pass() -> Self {
        Self {
            valid: true,
            message: String::new(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Deployment-specific validation settings
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub employee_email_domain: String,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            employee_email_domain: DEFAULT_EMPLOYEE_EMAIL_DOMAIN.to_string(),
        }
    }
}

impl ValidationRules {
    pub fn new(employee_email_domain: impl Into<String>) -> Self {
        Self {
            employee_email_domain: employee_email_domain.into(),
        }
    }

    pub fn validate_employee_email(&self, email: &str, field_name: &str) -> FieldCheck {
        let valid = email
            .rsplit_once('@')
            .map(|(local, domain)| {
                EMAIL_LOCAL_PART.is_match(local) && domain == self.employee_email_domain
            })
            .unwrap_or(false);
        if valid {
            FieldCheck::pass()
        } else {
            FieldCheck::fail(format!("Please enter a valid {} address", field_name))
        }
    }
}

pub fn validate_name(name: &str, field_name: &str) -> FieldCheck {
    if name.is_empty() {
        return FieldCheck::fail(format!("{} is required", field_name));
    }
    if !NAME_PATTERN.is_match(name) {
        return FieldCheck::fail(format!(
            "{} should only contain letters, spaces, and hyphens",
            field_name
        ));
    }
    if name.chars().count() < NAME_MIN_LEN {
        return FieldCheck::fail(format!(
            "{} should be at least {} characters long",
            field_name, NAME_MIN_LEN
        ));
    }
    FieldCheck::pass()
}

pub fn validate_diagnosis(diagnosis: &str) -> FieldCheck {
    let field_name = "Case Study Diagnosis";
    if diagnosis.is_empty() {
        return FieldCheck::fail(format!("{} is required", field_name));
    }
    if !DIAGNOSIS_PATTERN.is_match(diagnosis) {
        return FieldCheck::fail(format!(
            "{} should only contain letters, numbers, spaces, periods, and hyphens",
            field_name
        ));
    }
    if diagnosis.chars().count() > DIAGNOSIS_MAX_LEN {
        return FieldCheck::fail(format!(
            "{} should be less than {} characters long",
            field_name, DIAGNOSIS_MAX_LEN
        ));
    }
    FieldCheck::pass()
}

pub fn validate_email(email: &str) -> FieldCheck {
    if EMAIL_PATTERN.is_match(email) {
        FieldCheck::pass()
    } else {
        FieldCheck::fail("Please enter a valid Email address")
    }
}

pub fn validate_phone(phone: &str) -> FieldCheck {
    if PHONE_PATTERN.is_match(phone) {
        FieldCheck::pass()
    } else {
        FieldCheck::fail("Please enter a valid phone number")
    }
}

pub fn validate_address(address: &str) -> FieldCheck {
    if address.is_empty() {
        return FieldCheck::fail("Address is required");
    }
    if address.chars().count() < ADDRESS_MIN_LEN {
        return FieldCheck::fail("Please enter a valid address");
    }
    FieldCheck::pass()
}

pub fn validate_city(city: &str) -> FieldCheck {
    if city.is_empty() {
        return FieldCheck::fail("City is required");
    }
    if !CITY_PATTERN.is_match(city) {
        return FieldCheck::fail("City should only contain letters, spaces, and hyphens");
    }
    FieldCheck::pass()
}

pub fn validate_state(state: &str) -> FieldCheck {
    if state_name(state).is_some() {
        FieldCheck::pass()
    } else {
        FieldCheck::fail("Please select a valid state")
    }
}

pub fn validate_zip_code(zip_code: &str) -> FieldCheck {
    if ZIP_PATTERN.is_match(zip_code) {
        FieldCheck::pass()
    } else {
        FieldCheck::fail("Please enter a valid 5-digit ZIP code (or 5+4 format)")
    }
}

/// Earliest date of birth the form accepts
pub fn earliest_date_of_birth() -> NaiveDate {
    NaiveDate::from_ymd_opt(1904, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Parse a date of birth in `YYYY-MM-DD` or `MM/DD/YYYY` form
pub fn parse_date_of_birth(dob: &str) -> Option<NaiveDate> {
    let dob = dob.trim();
    NaiveDate::parse_from_str(dob, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(dob, DATE_FORMAT))
        .ok()
}

pub fn validate_date_of_birth(dob: &str, today: NaiveDate) -> FieldCheck {
    if dob.trim().is_empty() {
        return FieldCheck::fail("Date of Birth is required");
    }
    match parse_date_of_birth(dob) {
        Some(date) if date >= earliest_date_of_birth() && date <= today => FieldCheck::pass(),
        Some(_) => FieldCheck::fail(format!(
            "Date of Birth must be between {} and {}",
            earliest_date_of_birth().format(DATE_FORMAT),
            today.format(DATE_FORMAT)
        )),
        None => FieldCheck::fail("Date of Birth must be a valid date (MM/DD/YYYY)"),
    }
}

pub fn validate_mrn(mrn: &str) -> FieldCheck {
    if mrn.is_empty() {
        return FieldCheck::fail("Medical Record Number is required");
    }
    if !mrn.chars().all(|c| c.is_ascii_digit()) {
        return FieldCheck::fail("Medical Record Number should contain only numerical values");
    }
    FieldCheck::pass()
}

/// Verbal authorization satisfies the signature requirement on its own
pub fn validate_signature(signature: Option<&[u8]>, verbal_authorization: bool) -> FieldCheck {
    if verbal_authorization {
        return FieldCheck::pass();
    }
    match signature {
        None => FieldCheck::fail("Signature is required"),
        Some(image) if !signature::has_ink(image) => {
            FieldCheck::fail("Please provide a signature")
        }
        Some(_) => FieldCheck::pass(),
    }
}

/// Run every field rule against a form
pub fn validate_form(
    form: &IntakeForm,
    rules: &ValidationRules,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    let signature_check = match form.signature_png() {
        Ok(image) => validate_signature(image.as_deref(), form.verbal_authorization),
        Err(e) => FieldCheck::fail(e.to_string()),
    };

    let checks = [
        ("first_name", validate_name(form.first_name.trim(), "First Name")),
        ("last_name", validate_name(form.last_name.trim(), "Last Name")),
        (
            "date_of_birth",
            validate_date_of_birth(&form.date_of_birth, today),
        ),
        (
            "medical_record_number",
            validate_mrn(form.medical_record_number.trim()),
        ),
        ("email", validate_email(form.email.trim())),
        ("phone", validate_phone(form.phone.trim())),
        ("address", validate_address(form.address.trim())),
        ("state", validate_state(form.state.trim())),
        ("city", validate_city(form.city.trim())),
        ("zip_code", validate_zip_code(form.zip_code.trim())),
        (
            "employee_first_name",
            validate_name(form.employee_first_name.trim(), "Employee First Name"),
        ),
        (
            "employee_last_name",
            validate_name(form.employee_last_name.trim(), "Employee Last Name"),
        ),
        (
            "employee_email",
            rules.validate_employee_email(form.employee_email.trim(), "Employee Email"),
        ),
        (
            "employee_department",
            validate_name(form.employee_department.trim(), "Employee Department"),
        ),
        (
            "case_study_diagnosis",
            validate_diagnosis(form.case_study_diagnosis.trim()),
        ),
        ("signature", signature_check),
    ];

    let errors: Vec<FieldError> = checks
        .into_iter()
        .filter(|(_, check)| !check.valid)
        .map(|(field, check)| FieldError {
            field: field.to_string(),
            message: check.message,
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}
