//! Command-line and environment configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command-line arguments for the consent intake server
///
/// Every option can also be set through the environment (or a `.env` file).
#[derive(Parser, Debug, Clone)]
#[command(name = "consent-api")]
#[command(about = "Case study consent intake server")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3001")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// SQLite URL of the submission index
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:consent.db?mode=rwc"
    )]
    pub database_url: String,

    /// Directory for rendered artifacts when no object store is configured
    #[arg(long, env = "ARTIFACT_DIR", default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    /// Logical prefix of every artifact path
    #[arg(long, env = "ARTIFACT_PREFIX", default_value = "consent-forms")]
    pub artifact_prefix: String,

    /// Base URL of an HTTP object store; enables it instead of the filesystem
    #[arg(long, env = "STORAGE_URL")]
    pub storage_url: Option<String>,

    /// Bucket inside the object store
    #[arg(long, env = "STORAGE_BUCKET", default_value = "consent-forms")]
    pub storage_bucket: String,

    /// Bearer key for the object store
    #[arg(long, env = "STORAGE_KEY", hide_env_values = true)]
    pub storage_key: Option<String>,

    /// Consent form template
    #[arg(long, env = "TEMPLATE_PATH", default_value = "case_study_consent.pdf")]
    pub template_path: PathBuf,

    /// Topic URL that receives submission alerts
    #[arg(long, env = "NOTIFY_URL")]
    pub notify_url: Option<String>,

    /// Domain employee emails must belong to
    #[arg(long, env = "EMPLOYEE_EMAIL_DOMAIN", default_value = "samc.com")]
    pub employee_email_domain: String,

    /// Timeout for each storage, index and notification call in milliseconds
    #[arg(long, env = "IO_TIMEOUT_MS", default_value = "15000")]
    pub io_timeout_ms: u64,

    /// Seconds an idle intake session is kept before it is evicted
    #[arg(long, env = "SESSION_TTL_SECS", default_value = "1800")]
    pub session_ttl_secs: u64,

    /// Keep index and artifacts in memory only
    #[arg(long, env = "EPHEMERAL")]
    pub ephemeral: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
