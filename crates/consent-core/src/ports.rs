//! Collaborator seams used by the pipeline
//!
//! Storage and index backends are shared across every intake session. None
//! of these traits expose locking or transactions: the duplicate check and
//! the insert are separate calls.

use async_trait::async_trait;

use crate::error::{IndexError, NotificationError, RenderError, StorageError};
use crate::record::{CommittedSubmission, SubmissionRecord};

/// Durable storage for rendered consent documents
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `path`; paths are never reused
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Queryable index of committed submissions
#[async_trait]
pub trait SubmissionIndex: Send + Sync {
    /// Every committed row whose `medical_record_number` equals `mrn`
    async fn find_by_mrn(&self, mrn: &str) -> Result<Vec<CommittedSubmission>, IndexError>;

    async fn insert(&self, row: &CommittedSubmission) -> Result<(), IndexError>;
}

/// Stamps a record onto the consent template
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, record: &SubmissionRecord) -> Result<Vec<u8>, RenderError>;
}

/// Best-effort alert sent after a commit
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), NotificationError>;
}
