//! Raw intake form payload

use serde::{Deserialize, Serialize};

use crate::signature::{self, SignatureError};

/// Form fields exactly as the client submitted them
///
/// Nothing here is trusted; [`crate::SubmissionBuilder`] validates every
/// field before a [`crate::SubmissionRecord`] exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeForm {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD` or `MM/DD/YYYY`
    pub date_of_birth: String,
    pub medical_record_number: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub authorized_person: Option<String>,
    pub verbal_authorization: bool,
    /// Base64 PNG or `data:image/png;base64,` URL from the signature canvas
    pub signature: Option<String>,
    pub employee_first_name: String,
    pub employee_last_name: String,
    pub employee_email: String,
    pub employee_department: String,
    pub case_study_diagnosis: String,
}

impl IntakeForm {
    /// Decoded signature PNG, if the client sent one
    pub fn signature_png(&self) -> Result<Option<Vec<u8>>, SignatureError> {
        match self.signature.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(payload) => signature::decode_payload(payload).map(Some),
        }
    }
}
