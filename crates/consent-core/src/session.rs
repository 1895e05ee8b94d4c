//! Intake session state machine
//!
//! ```text
//! AwaitingInput ──submit──▶ PendingConflictDecision ──confirm──▶ Committed
//!       │                        │        ▲
//!       │                        │        └─submit (supersedes)
//!       │                        └──abandon──▶ Abandoned
//!       └──submit (no match)──────────────────▶ Committed
//! ```
//!
//! Failures leave the state unchanged so the user can retry, except a failed
//! resubmission during a pending conflict: the pending record was already
//! replaced, so the session drops back to `AwaitingInput`. `reset` returns
//! any state to `AwaitingInput`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::SessionError;
use crate::pipeline::SubmissionPipeline;
use crate::record::{DuplicateSet, Outcome, SubmissionRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeState {
    AwaitingInput,
    PendingConflictDecision {
        record: Box<SubmissionRecord>,
        duplicates: DuplicateSet,
    },
    Committed {
        storage_path: String,
    },
    Abandoned,
}

impl IntakeState {
    pub fn name(&self) -> &'static str {
        match self {
            IntakeState::AwaitingInput => "awaiting_input",
            IntakeState::PendingConflictDecision { .. } => "pending_conflict_decision",
            IntakeState::Committed { .. } => "committed",
            IntakeState::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntakeSession {
    id: Uuid,
    state: IntakeState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Default for IntakeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl IntakeSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: IntakeState::AwaitingInput,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &IntakeState {
        &self.state
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Run a freshly built record through the pipeline
    ///
    /// Allowed while awaiting input or while a conflict is pending, in which
    /// case the new record replaces the pending one.
    pub async fn submit(
        &mut self,
        pipeline: &SubmissionPipeline,
        record: SubmissionRecord,
    ) -> Result<Outcome, SessionError> {
        let superseding = match self.state {
            IntakeState::AwaitingInput => false,
            IntakeState::PendingConflictDecision { .. } => true,
            _ => return Err(self.invalid("submit")),
        };
        let outcome = pipeline.submit(record.clone(), false).await;
        match outcome {
            Outcome::Failure { .. } if superseding => self.transition(IntakeState::AwaitingInput),
            _ => self.apply(&outcome, record),
        }
        Ok(outcome)
    }

    /// Commit the pending record despite its duplicates
    pub async fn confirm(&mut self, pipeline: &SubmissionPipeline) -> Result<Outcome, SessionError> {
        let record = match &self.state {
            IntakeState::PendingConflictDecision { record, .. } => (**record).clone(),
            _ => return Err(self.invalid("confirm")),
        };
        let outcome = pipeline.submit(record.clone(), true).await;
        self.apply(&outcome, record);
        Ok(outcome)
    }

    /// Drop the pending record
    pub fn abandon(&mut self) -> Result<(), SessionError> {
        match self.state {
            IntakeState::PendingConflictDecision { .. } => {
                self.transition(IntakeState::Abandoned);
                Ok(())
            }
            _ => Err(self.invalid("abandon")),
        }
    }

    /// Clear the form and start over
    pub fn reset(&mut self) {
        self.transition(IntakeState::AwaitingInput);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let (storage_path, duplicates) = match &self.state {
            IntakeState::Committed { storage_path } => (Some(storage_path.clone()), None),
            IntakeState::PendingConflictDecision { duplicates, .. } => {
                (None, Some(duplicates.clone()))
            }
            _ => (None, None),
        };
        SessionSnapshot {
            id: self.id,
            state: self.state.name(),
            storage_path,
            duplicates,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn apply(&mut self, outcome: &Outcome, record: SubmissionRecord) {
        match outcome {
            Outcome::Committed { storage_path } => self.transition(IntakeState::Committed {
                storage_path: storage_path.clone(),
            }),
            Outcome::Conflict { duplicates } => {
                self.transition(IntakeState::PendingConflictDecision {
                    record: Box::new(record),
                    duplicates: duplicates.clone(),
                })
            }
            Outcome::Failure { .. } => {}
        }
    }

    fn transition(&mut self, next: IntakeState) {
        tracing::debug!(session = %self.id, from = self.state.name(), to = next.name(), "Session transition");
        self.state = next;
        self.updated_at = Utc::now();
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            from: self.state.name(),
            action,
        }
    }
}

/// Serializable view of a session for clients
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<DuplicateSet>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::memory::{MemoryArtifactStore, MemoryIndex};
    use crate::pipeline::PipelineConfig;
    use crate::ports::{DocumentRenderer, SubmissionIndex};
    use crate::record::fixtures::{committed, verbal_record};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct FlakyRenderer {
        broken: AtomicBool,
    }

    impl DocumentRenderer for FlakyRenderer {
        fn render(&self, _record: &SubmissionRecord) -> Result<Vec<u8>, RenderError> {
            if self.broken.load(Ordering::SeqCst) {
                Err(RenderError::MalformedTemplate("no pages".to_string()))
            } else {
                Ok(b"%PDF-1.7".to_vec())
            }
        }
    }

    async fn setup(existing: &[&str]) -> (SubmissionPipeline, Arc<MemoryIndex>, Arc<FlakyRenderer>) {
        let index = Arc::new(MemoryIndex::new());
        for mrn in existing {
            index
                .insert(&committed(mrn, Some("01/01/2024"), None))
                .await
                .unwrap();
        }
        let renderer = Arc::new(FlakyRenderer::default());
        let pipeline = SubmissionPipeline::new(
            renderer.clone(),
            Arc::new(MemoryArtifactStore::new()),
            index.clone(),
            PipelineConfig::default(),
        );
        (pipeline, index, renderer)
    }

    #[tokio::test]
    async fn fresh_submission_goes_straight_to_committed() {
        let (pipeline, _, _) = setup(&[]).await;
        let mut session = IntakeSession::new();

        let outcome = session
            .submit(&pipeline, verbal_record("10", "09/03/2024"))
            .await
            .unwrap();

        assert!(outcome.is_committed());
        assert_eq!(session.state().name(), "committed");
        assert!(session.snapshot().storage_path.is_some());
    }

    #[tokio::test]
    async fn conflict_then_confirm_commits() {
        let (pipeline, index, _) = setup(&["10"]).await;
        let mut session = IntakeSession::new();

        session
            .submit(&pipeline, verbal_record("10", "09/03/2024"))
            .await
            .unwrap();
        assert_eq!(session.state().name(), "pending_conflict_decision");
        assert_eq!(session.snapshot().duplicates.unwrap().len(), 1);

        let outcome = session.confirm(&pipeline).await.unwrap();
        assert!(outcome.is_committed());
        assert_eq!(index.count_for("10").await, 2);
    }

    #[tokio::test]
    async fn conflict_then_abandon_writes_nothing() {
        let (pipeline, index, _) = setup(&["10"]).await;
        let mut session = IntakeSession::new();

        session
            .submit(&pipeline, verbal_record("10", "09/03/2024"))
            .await
            .unwrap();
        session.abandon().unwrap();

        assert_eq!(session.state(), &IntakeState::Abandoned);
        assert_eq!(index.count_for("10").await, 1);
        assert!(session.confirm(&pipeline).await.is_err());
    }

    #[tokio::test]
    async fn resubmission_supersedes_pending_record() {
        let (pipeline, _, _) = setup(&["10"]).await;
        let mut session = IntakeSession::new();

        session
            .submit(&pipeline, verbal_record("10", "09/03/2024"))
            .await
            .unwrap();
        let outcome = session
            .submit(&pipeline, verbal_record("11", "09/03/2024"))
            .await
            .unwrap();

        assert!(outcome.is_committed());
        assert_eq!(session.state().name(), "committed");
    }

    #[tokio::test]
    async fn failed_resubmission_drops_replaced_record() {
        let (pipeline, index, renderer) = setup(&["10"]).await;
        let mut session = IntakeSession::new();
        session
            .submit(&pipeline, verbal_record("10", "09/03/2024"))
            .await
            .unwrap();

        renderer.broken.store(true, Ordering::SeqCst);
        let outcome = session
            .submit(&pipeline, verbal_record("11", "09/03/2024"))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Failure { .. }));
        assert_eq!(session.state(), &IntakeState::AwaitingInput);

        renderer.broken.store(false, Ordering::SeqCst);
        let err = session.confirm(&pipeline).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                from: "awaiting_input",
                action: "confirm"
            }
        );
        assert_eq!(index.count_for("10").await, 1);
        assert_eq!(index.count_for("11").await, 0);
    }

    #[tokio::test]
    async fn failed_confirm_keeps_pending_record() {
        let (pipeline, index, renderer) = setup(&["10"]).await;
        let mut session = IntakeSession::new();
        session
            .submit(&pipeline, verbal_record("10", "09/03/2024"))
            .await
            .unwrap();

        renderer.broken.store(true, Ordering::SeqCst);
        let outcome = session.confirm(&pipeline).await.unwrap();
        assert!(matches!(outcome, Outcome::Failure { .. }));
        assert_eq!(session.state().name(), "pending_conflict_decision");

        renderer.broken.store(false, Ordering::SeqCst);
        assert!(session.confirm(&pipeline).await.unwrap().is_committed());
        assert_eq!(index.count_for("10").await, 2);
    }

    #[tokio::test]
    async fn terminal_states_reject_actions_until_reset() {
        let (pipeline, _, _) = setup(&[]).await;
        let mut session = IntakeSession::new();
        session
            .submit(&pipeline, verbal_record("10", "09/03/2024"))
            .await
            .unwrap();

        let err = session
            .submit(&pipeline, verbal_record("10", "09/03/2024"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                from: "committed",
                action: "submit"
            }
        );
        assert!(session.abandon().is_err());

        session.reset();
        assert_eq!(session.state(), &IntakeState::AwaitingInput);
    }
}
