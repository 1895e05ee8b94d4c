//! Duplicate-aware submission pipeline
//!
//! `submit` looks up prior submissions by MRN, returns a conflict for human
//! adjudication unless the caller forces the commit, and otherwise renders,
//! uploads and indexes the record. The lookup and the insert are not
//! isolated from each other: two sessions racing on the same MRN may both
//! commit, and the duplicate is reconciled by people later.
//!
//! The pipeline keeps no state between calls. A conflict return holds no
//! lock; the caller re-invokes with `force_commit = true` or drops the record.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{IndexError, RenderError, StorageError};
use crate::ports::{ArtifactStore, DocumentRenderer, Notifier, SubmissionIndex};
use crate::record::{
    artifact_path, new_artifact_suffix, CommittedSubmission, DuplicateSet, Outcome,
    SubmissionRecord,
};

pub const REASON_LOOKUP_FAILED: &str = "duplicate lookup failed";
pub const REASON_RENDER_FAILED: &str = "document render failed";
pub const REASON_UPLOAD_FAILED: &str = "artifact upload failed";
pub const REASON_INDEX_FAILED: &str = "index write failed";

pub const DEFAULT_ARTIFACT_PREFIX: &str = "consent-forms";
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Logical prefix every artifact path starts with
    pub artifact_prefix: String,
    /// Upper bound for each storage, index and notifier call
    pub io_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
enum CommitError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl CommitError {
    fn reason(&self) -> &'static str {
        match self {
            CommitError::Render(_) => REASON_RENDER_FAILED,
            CommitError::Storage(_) => REASON_UPLOAD_FAILED,
            CommitError::Index(_) => REASON_INDEX_FAILED,
        }
    }
}

pub struct SubmissionPipeline {
    renderer: Arc<dyn DocumentRenderer>,
    artifacts: Arc<dyn ArtifactStore>,
    index: Arc<dyn SubmissionIndex>,
    notifier: Option<Arc<dyn Notifier>>,
    config: PipelineConfig,
}

impl SubmissionPipeline {
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        artifacts: Arc<dyn ArtifactStore>,
        index: Arc<dyn SubmissionIndex>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            renderer,
            artifacts,
            index,
            notifier: None,
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Prior submissions for `mrn`, most recent first
    pub async fn duplicates(&self, mrn: &str) -> Result<DuplicateSet, IndexError> {
        let matches = bounded(self.config.io_timeout, self.index.find_by_mrn(mrn))
            .await
            .unwrap_or(Err(IndexError::Timeout))?;
        Ok(DuplicateSet::from_matches(matches))
    }

    /// Submit a record, surfacing existing MRN matches unless forced
    pub async fn submit(&self, mut record: SubmissionRecord, force_commit: bool) -> Outcome {
        let duplicates = match self.duplicates(&record.medical_record_number).await {
            Ok(duplicates) => duplicates,
            Err(e) => {
                warn!(error = %e, "Duplicate lookup failed");
                return Outcome::failure(REASON_LOOKUP_FAILED);
            }
        };

        if !duplicates.is_empty() {
            if !force_commit {
                info!(
                    matches = duplicates.len(),
                    "Existing submissions found, awaiting adjudication"
                );
                return Outcome::Conflict { duplicates };
            }
            info!(
                matches = duplicates.len(),
                "Committing over existing submissions by request"
            );
        }

        match self.commit(&mut record).await {
            Ok(storage_path) => {
                info!(path = %storage_path, "Submission committed");
                self.notify(&record);
                Outcome::Committed { storage_path }
            }
            Err(e) => {
                warn!(error = %e, "Submission aborted");
                Outcome::failure(e.reason())
            }
        }
    }

    async fn commit(&self, record: &mut SubmissionRecord) -> Result<String, CommitError> {
        record.submitted_at = Some(Utc::now());

        let artifact = self.render(record).await?;
        let digest = hex::encode(Sha256::digest(&artifact));
        let path = artifact_path(&self.config.artifact_prefix, record, &new_artifact_suffix());
        debug!(path = %path, bytes = artifact.len(), "Uploading artifact");

        bounded(self.config.io_timeout, self.artifacts.put(&path, &artifact))
            .await
            .unwrap_or(Err(StorageError::Timeout))?;

        // From here on a failure leaves an orphaned artifact; its unique
        // suffix keeps it from colliding with later uploads.
        let row = CommittedSubmission::from_record(record, Uuid::new_v4(), path.clone(), digest);
        bounded(self.config.io_timeout, self.index.insert(&row))
            .await
            .unwrap_or(Err(IndexError::Timeout))?;

        Ok(path)
    }

    async fn render(&self, record: &SubmissionRecord) -> Result<Vec<u8>, RenderError> {
        let renderer = Arc::clone(&self.renderer);
        let snapshot = record.clone();
        tokio::task::spawn_blocking(move || renderer.render(&snapshot))
            .await
            .map_err(|e| RenderError::Aborted(e.to_string()))?
    }

    /// Send the alert on its own task; the commit never waits for it
    fn notify(&self, record: &SubmissionRecord) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let record = record.clone();
        let limit = self.config.io_timeout;
        tokio::spawn(async move {
            match bounded(limit, notifier.notify(&record)).await {
                Some(Ok(())) => debug!("Submission notification sent"),
                Some(Err(e)) => warn!(error = %e, "Submission notification failed"),
                None => warn!("Submission notification timed out"),
            }
        });
    }
}

/// Run `fut` with a deadline; `None` when it elapsed
async fn bounded<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}
