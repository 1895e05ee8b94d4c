//! Application state for the consent API

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use consent_core::{
    ArtifactStore, DocumentRenderer, IntakeSession, MemoryArtifactStore, MemoryIndex,
    Notifier, PipelineConfig, SubmissionBuilder, SubmissionIndex, SubmissionPipeline,
    ValidationRules,
};
use consent_pdf::TemplateRenderer;

use crate::config::Args;
use crate::notify::HttpNotifier;
use crate::storage::{FsArtifactStore, HttpObjectStore, SqliteIndex};

pub type SharedSession = Arc<Mutex<IntakeSession>>;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

pub struct AppState {
    pub pipeline: SubmissionPipeline,
    pub builder: SubmissionBuilder,
    pub artifacts: Arc<dyn ArtifactStore>,
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    session_ttl: Duration,
}

impl AppState {
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        artifacts: Arc<dyn ArtifactStore>,
        index: Arc<dyn SubmissionIndex>,
        notifier: Option<Arc<dyn Notifier>>,
        builder: SubmissionBuilder,
        config: PipelineConfig,
    ) -> Self {
        let mut pipeline = SubmissionPipeline::new(renderer, Arc::clone(&artifacts), index, config);
        if let Some(notifier) = notifier {
            pipeline = pipeline.with_notifier(notifier);
        }
        Self {
            pipeline,
            builder,
            artifacts,
            sessions: RwLock::new(HashMap::new()),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Wire up backends from configuration
    pub async fn from_args(args: &Args) -> Result<Self> {
        let io_timeout = args.io_timeout();

        let (artifacts, index): (Arc<dyn ArtifactStore>, Arc<dyn SubmissionIndex>) =
            if args.ephemeral {
                tracing::warn!("Running ephemeral: submissions are kept in memory only");
                (
                    Arc::new(MemoryArtifactStore::new()),
                    Arc::new(MemoryIndex::new()),
                )
            } else {
                let index = SqliteIndex::connect(&args.database_url)
                    .await
                    .context("failed to open submission index")?;
                let artifacts: Arc<dyn ArtifactStore> = match &args.storage_url {
                    Some(url) => {
                        tracing::info!("Storing artifacts in object store at {}", url);
                        Arc::new(HttpObjectStore::new(
                            url,
                            args.storage_bucket.clone(),
                            args.storage_key.clone(),
                            io_timeout,
                        )?)
                    }
                    None => {
                        tracing::info!("Storing artifacts under {}", args.artifact_dir.display());
                        Arc::new(FsArtifactStore::new(&args.artifact_dir))
                    }
                };
                (artifacts, Arc::new(index))
            };

        let notifier: Option<Arc<dyn Notifier>> = match &args.notify_url {
            Some(url) => Some(Arc::new(HttpNotifier::new(url.clone(), io_timeout)?)),
            None => None,
        };

        if !args.template_path.exists() {
            tracing::warn!(
                "Consent template not found at {}; submissions will fail until it exists",
                args.template_path.display()
            );
        }

        let state = Self::new(
            Arc::new(TemplateRenderer::new(&args.template_path)),
            artifacts,
            index,
            notifier,
            SubmissionBuilder::new(ValidationRules::new(args.employee_email_domain.clone())),
            PipelineConfig {
                artifact_prefix: args.artifact_prefix.clone(),
                io_timeout,
            },
        )
        .with_session_ttl(args.session_ttl());
        Ok(state)
    }

    pub async fn open_session(&self) -> SharedSession {
        let session = IntakeSession::new();
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&shared));
        tracing::info!(session = %id, "Opened intake session");
        shared
    }

    pub async fn session(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions whose last transition is older than the TTL at `now`
    ///
    /// Sessions locked by an in-flight request are kept until the next sweep.
    pub async fn prune_idle_sessions(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.session_ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(session) => (now - session.updated_at())
                .to_std()
                .map_or(true, |idle| idle < ttl),
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Evicted idle intake sessions");
        }
        evicted
    }
}

/// Periodically evict idle sessions for the life of the server
pub fn spawn_session_sweeper(state: Arc<AppState>) -> JoinHandle<()> {
    let period = state.session_ttl.clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            state.prune_idle_sessions(Utc::now()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_core::RenderError;
    use consent_core::SubmissionRecord;

    struct NullRenderer;

    impl DocumentRenderer for NullRenderer {
        fn render(&self, _record: &SubmissionRecord) -> Result<Vec<u8>, RenderError> {
            Ok(b"%PDF-1.7".to_vec())
        }
    }

    fn create_state(ttl: Duration) -> AppState {
        AppState::new(
            Arc::new(NullRenderer),
            Arc::new(MemoryArtifactStore::new()),
            Arc::new(MemoryIndex::new()),
            None,
            SubmissionBuilder::default(),
            PipelineConfig::default(),
        )
        .with_session_ttl(ttl)
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_after_ttl() {
        let state = create_state(Duration::from_secs(60));
        for _ in 0..1000 {
            let session = state.open_session().await;
            session.lock().await.reset();
        }
        assert_eq!(state.session_count().await, 1000);

        assert_eq!(state.prune_idle_sessions(Utc::now()).await, 0);
        assert_eq!(state.session_count().await, 1000);

        let later = Utc::now() + chrono::Duration::seconds(61);
        assert_eq!(state.prune_idle_sessions(later).await, 1000);
        assert_eq!(state.session_count().await, 0);
    }

    #[tokio::test]
    async fn evicted_session_is_no_longer_found() {
        let state = create_state(Duration::from_secs(60));
        let id = state.open_session().await.lock().await.id();

        state
            .prune_idle_sessions(Utc::now() + chrono::Duration::seconds(120))
            .await;
        assert!(state.session(id).await.is_none());
    }

    #[tokio::test]
    async fn sessions_in_use_survive_a_sweep() {
        let state = create_state(Duration::from_secs(60));
        let session = state.open_session().await;
        let _guard = session.lock().await;

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(state.prune_idle_sessions(later).await, 0);
        assert_eq!(state.session_count().await, 1);
    }
}
