//! Request and response bodies

use serde::{Deserialize, Serialize};

use consent_core::{Outcome, SessionSnapshot};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Dropdown entry for the state field
#[derive(Debug, Serialize)]
pub struct StateOption {
    pub code: &'static str,
    pub name: &'static str,
}

/// Pipeline outcome together with the session it moved
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub session: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionQuery {
    pub mrn: String,
}
