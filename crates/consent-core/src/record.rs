//! Submission record model
//!
//! A [`SubmissionRecord`] is built in memory once the form validates and
//! becomes durable only through the pipeline. The committed form of a record
//! is a [`CommittedSubmission`] index row, which never carries the signature
//! image.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DATE_FORMAT;

/// How the patient authorized the case study
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMode {
    Signed,
    Verbal,
}

impl AuthorizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationMode::Signed => "signed",
            AuthorizationMode::Verbal => "verbal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "signed" => Some(AuthorizationMode::Signed),
            "verbal" => Some(AuthorizationMode::Verbal),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuthorizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization evidence
///
/// The signature image lives inside the `Signed` variant, so a record can
/// never hold both a drawn signature and a verbal authorization, or neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Signed {
        /// PNG bytes of the drawn signature
        image: Vec<u8>,
        signature_date: String,
    },
    Verbal {
        auth_date: String,
    },
}

impl Authorization {
    pub fn mode(&self) -> AuthorizationMode {
        match self {
            Authorization::Signed { .. } => AuthorizationMode::Signed,
            Authorization::Verbal { .. } => AuthorizationMode::Verbal,
        }
    }

    pub fn signature_image(&self) -> Option<&[u8]> {
        match self {
            Authorization::Signed { image, .. } => Some(image),
            Authorization::Verbal { .. } => None,
        }
    }

    pub fn signature_date(&self) -> Option<&str> {
        match self {
            Authorization::Signed { signature_date, .. } => Some(signature_date),
            Authorization::Verbal { .. } => None,
        }
    }

    pub fn verbal_auth_date(&self) -> Option<&str> {
        match self {
            Authorization::Signed { .. } => None,
            Authorization::Verbal { auth_date } => Some(auth_date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientIdentity {
    pub first_name: String,
    pub last_name: String,
    /// MM/DD/YYYY
    pub date_of_birth: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    /// USPS state code
    pub state: String,
    pub zip_code: String,
}

impl PatientIdentity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeIdentity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
}

impl EmployeeIdentity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A validated consent submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub patient: PatientIdentity,
    /// Digits only; the duplicate detection key
    pub medical_record_number: String,
    pub authorization: Authorization,
    /// Name and relationship of a representative, if one signed
    pub authorized_person: Option<String>,
    pub employee: EmployeeIdentity,
    pub case_topic: String,
    /// Assigned by the pipeline at commit time
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SubmissionRecord {
    pub fn mode(&self) -> AuthorizationMode {
        self.authorization.mode()
    }
}

/// Build the storage path for a rendered artifact
///
/// `{prefix}/{lastName}_{firstName}_{mrn}_{suffix}.pdf`, with whitespace in
/// names replaced by `-`.
pub fn artifact_path(prefix: &str, record: &SubmissionRecord, suffix: &str) -> String {
    let file_name = format!(
        "{}_{}_{}_{}.pdf",
        path_segment(&record.patient.last_name),
        path_segment(&record.patient.first_name),
        record.medical_record_number,
        suffix
    );
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// Fresh 8-character disambiguator for an artifact path
pub fn new_artifact_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn path_segment(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Index row for a committed submission
///
/// Carries every record field except the signature image, plus where the
/// rendered artifact was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedSubmission {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub medical_record_number: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub authorized_person: Option<String>,
    pub authorization_mode: AuthorizationMode,
    pub signature_date: Option<String>,
    pub verbal_auth_date: Option<String>,
    pub employee_first_name: String,
    pub employee_last_name: String,
    pub employee_email: String,
    pub employee_department: String,
    pub case_topic: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub artifact_storage_path: String,
    pub artifact_sha256: String,
}

impl CommittedSubmission {
    pub fn from_record(
        record: &SubmissionRecord,
        id: Uuid,
        artifact_storage_path: String,
        artifact_sha256: String,
    ) -> Self {
        Self {
            id,
            first_name: record.patient.first_name.clone(),
            last_name: record.patient.last_name.clone(),
            date_of_birth: record.patient.date_of_birth.clone(),
            medical_record_number: record.medical_record_number.clone(),
            email: record.patient.email.clone(),
            phone: record.patient.phone.clone(),
            address: record.patient.address.clone(),
            city: record.patient.city.clone(),
            state: record.patient.state.clone(),
            zip_code: record.patient.zip_code.clone(),
            authorized_person: record.authorized_person.clone(),
            authorization_mode: record.mode(),
            signature_date: record.authorization.signature_date().map(str::to_string),
            verbal_auth_date: record.authorization.verbal_auth_date().map(str::to_string),
            employee_first_name: record.employee.first_name.clone(),
            employee_last_name: record.employee.last_name.clone(),
            employee_email: record.employee.email.clone(),
            employee_department: record.employee.department.clone(),
            case_topic: record.case_topic.clone(),
            submitted_at: record.submitted_at,
            artifact_storage_path,
            artifact_sha256,
        }
    }

    /// Date used to order duplicates: signature date, else verbal date
    pub fn authorization_date(&self) -> Option<NaiveDate> {
        parse_date(self.signature_date.as_deref())
            .or_else(|| parse_date(self.verbal_auth_date.as_deref()))
    }
}

fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw?.trim(), DATE_FORMAT).ok()
}

/// Prior submissions sharing one MRN, most recent first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DuplicateSet(Vec<CommittedSubmission>);

impl DuplicateSet {
    /// Order matches by authorization date, newest first
    ///
    /// Rows without a usable date sort last. Rows sharing a date fall back to
    /// commit time, newest first.
    pub fn from_matches(mut matches: Vec<CommittedSubmission>) -> Self {
        matches.sort_by(|a, b| {
            b.authorization_date()
                .cmp(&a.authorization_date())
                .then_with(|| b.submitted_at.cmp(&a.submitted_at))
        });
        Self(matches)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommittedSubmission> {
        self.0.iter()
    }

    pub fn latest(&self) -> Option<&CommittedSubmission> {
        self.0.first()
    }

    pub fn into_inner(self) -> Vec<CommittedSubmission> {
        self.0
    }
}

/// Result of one pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Committed { storage_path: String },
    Conflict { duplicates: DuplicateSet },
    Failure { reason: String },
}

impl Outcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Outcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed { .. })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn dates(set: &DuplicateSet) -> Vec<Option<String>> {
        set.iter()
            .map(|r| r.signature_date.clone().or(r.verbal_auth_date.clone()))
            .collect()
    }

    #[test]
    fn duplicates_order_most_recent_first_across_modes() {
        let set = DuplicateSet::from_matches(vec![
            committed("1001", Some("01/01/2024"), None),
            committed("1001", Some("03/01/2024"), None),
            committed("1001", None, Some("02/01/2024")),
        ]);

        assert_eq!(
            dates(&set),
            vec![
                Some("03/01/2024".to_string()),
                Some("02/01/2024".to_string()),
                Some("01/01/2024".to_string()),
            ]
        );
    }

    #[test]
    fn undated_duplicates_sort_last() {
        let set = DuplicateSet::from_matches(vec![
            committed("1001", None, None),
            committed("1001", Some("06/15/2023"), None),
        ]);
        assert_eq!(set.latest().unwrap().signature_date.as_deref(), Some("06/15/2023"));
        assert_eq!(set.iter().last().unwrap().authorization_date(), None);
    }

    #[test]
    fn unreadable_signature_date_falls_back_to_verbal_date() {
        let row = committed("1001", Some("sometime in May"), Some("05/20/2024"));
        assert_eq!(
            row.authorization_date(),
            NaiveDate::from_ymd_opt(2024, 5, 20)
        );

        let set = DuplicateSet::from_matches(vec![
            committed("1001", Some("01/01/2024"), None),
            row,
        ]);
        assert_eq!(set.latest().unwrap().verbal_auth_date.as_deref(), Some("05/20/2024"));
    }

    #[test]
    fn ordering_is_chronological_across_years() {
        let set = DuplicateSet::from_matches(vec![
            committed("1001", Some("12/31/2023"), None),
            committed("1001", Some("01/02/2024"), None),
        ]);
        assert_eq!(set.latest().unwrap().signature_date.as_deref(), Some("01/02/2024"));
    }

    #[test]
    fn artifact_path_follows_naming_scheme() {
        let mut record = verbal_record("556677", "05/05/2024");
        record.patient.first_name = "Mary Ann".to_string();
        record.patient.last_name = "Smith-Jones".to_string();

        assert_eq!(
            artifact_path("consent-forms", &record, "a1b2c3d4"),
            "consent-forms/Smith-Jones_Mary-Ann_556677_a1b2c3d4.pdf"
        );
        assert_eq!(
            artifact_path("", &record, "a1b2c3d4"),
            "Smith-Jones_Mary-Ann_556677_a1b2c3d4.pdf"
        );
    }

    #[test]
    fn artifact_suffixes_are_eight_hex_chars_and_unique() {
        let a = new_artifact_suffix();
        let b = new_artifact_suffix();
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn committed_row_omits_signature_and_keeps_dates() {
        let record = SubmissionRecord {
            authorization: Authorization::Signed {
                image: vec![1, 2, 3],
                signature_date: "07/04/2024".to_string(),
            },
            ..verbal_record("42", "ignored")
        };
        let row = CommittedSubmission::from_record(
            &record,
            Uuid::new_v4(),
            "consent-forms/x.pdf".to_string(),
            "ab".to_string(),
        );

        assert_eq!(row.authorization_mode, AuthorizationMode::Signed);
        assert_eq!(row.signature_date.as_deref(), Some("07/04/2024"));
        assert_eq!(row.verbal_auth_date, None);
        let json = serde_json::to_value(&row).unwrap();
        assert!(json.get("signature").is_none());
        assert!(json.get("image").is_none());
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(Outcome::failure("artifact upload failed")).unwrap();
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["reason"], "artifact upload failed");
    }

    proptest! {
        #[test]
        fn duplicate_order_is_non_increasing(days in prop::collection::vec(0i64..3650, 1..20)) {
            let base = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
            let rows = days
                .iter()
                .map(|d| {
                    let date = (base + chrono::Duration::days(*d)).format(DATE_FORMAT).to_string();
                    committed("7", Some(&date), None)
                })
                .collect();
            let set = DuplicateSet::from_matches(rows);
            let ordered: Vec<_> = set.iter().map(|r| r.authorization_date()).collect();
            prop_assert!(ordered.windows(2).all(|w| w[0] >= w[1]));
            prop_assert_eq!(set.len(), days.len());
        }
    }
}
