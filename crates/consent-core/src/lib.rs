//! Case study consent intake core
//!
//! This crate owns everything between a raw form payload and a durably
//! stored consent record:
//!
//! - `validation`: per-field format rules for the intake form
//! - `builder`: turns a validated form into a typed [`SubmissionRecord`]
//! - `pipeline`: duplicate-aware submission (lookup by MRN, human
//!   adjudication on conflict, artifact upload, index insert, notification)
//! - `session`: the intake state machine driven by the HTTP layer
//! - `ports`: the storage, index, renderer and notifier seams
//! - `memory`: in-process adapters for tests and ephemeral deployments

pub mod builder;
pub mod error;
pub mod form;
pub mod memory;
pub mod notification;
pub mod pipeline;
pub mod ports;
pub mod record;
pub mod session;
pub mod signature;
pub mod validation;

pub use builder::SubmissionBuilder;
pub use error::{
    BuildError, FieldError, IndexError, NotificationError, RenderError, SessionError,
    StorageError, ValidationError,
};
pub use form::IntakeForm;
pub use memory::{MemoryArtifactStore, MemoryIndex};
pub use pipeline::{PipelineConfig, SubmissionPipeline};
pub use ports::{ArtifactStore, DocumentRenderer, Notifier, SubmissionIndex};
pub use record::{
    Authorization, AuthorizationMode, CommittedSubmission, DuplicateSet, EmployeeIdentity,
    Outcome, PatientIdentity, SubmissionRecord,
};
pub use session::{IntakeSession, IntakeState, SessionSnapshot};
pub use validation::{FieldCheck, ValidationRules};

/// Date format used on the consent document and in the index
pub const DATE_FORMAT: &str = "%m/%d/%Y";
