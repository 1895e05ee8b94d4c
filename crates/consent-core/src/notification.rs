//! Plain-text submission alert

use chrono::Utc;

use crate::record::SubmissionRecord;
use crate::DATE_FORMAT;

/// Alert body: submission date, employee name and email, case topic
///
/// Contains no patient identifiers.
pub fn notification_message(record: &SubmissionRecord) -> String {
    let date = record
        .submitted_at
        .unwrap_or_else(Utc::now)
        .format(DATE_FORMAT);
    format!(
        "New case study consent submitted\n\
         Submission Date: {}\n\
         Employee: {}\n\
         Employee Email: {}\n\
         Case Study Diagnosis: {}",
        date,
        record.employee.full_name(),
        record.employee.email,
        record.case_topic
    )
}
