//! Error taxonomy for the intake flow
//!
//! Validation and build errors never reach the pipeline. Render, storage and
//! index errors abort a commit; notification errors are logged and dropped.

use serde::Serialize;
use thiserror::Error;

/// A single failed field rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All field rules that failed for one form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} field(s) failed validation", errors.len())]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("A drawn signature and verbal authorization cannot both be supplied")]
    AmbiguousAuthorization,

    #[error("Either a drawn signature or verbal authorization is required")]
    MissingAuthorization,

    #[error("Invalid signature payload: {0}")]
    InvalidSignature(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template unreadable at {path}: {reason}")]
    TemplateUnreadable { path: String, reason: String },

    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    #[error("Invalid render input: {0}")]
    InvalidInput(String),

    #[error("Render task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Artifact already exists: {0}")]
    AlreadyExists(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Invalid artifact path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Storage service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Storage request timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index database error: {0}")]
    Database(String),

    #[error("Corrupt index row: {0}")]
    CorruptRow(String),

    #[error("Index request timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification transport error: {0}")]
    Transport(String),

    #[error("Notification endpoint rejected message ({0})")]
    Rejected(u16),

    #[error("Notification timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Cannot {action} while session is {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
}
