//! Case study consent intake server
//!
//! Provides REST endpoints for:
//! - Intake sessions (submit, confirm over duplicates, abandon, reset)
//! - Prior submission lookup by MRN
//! - Download of stored consent documents
//!
//! Each submission is validated, checked for earlier consents with the same
//! MRN, stamped onto the consent template, uploaded and indexed.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod handlers;
mod models;
mod notify;
mod state;
mod storage;
#[cfg(test)]
mod tests;

use config::Args;
use handlers::*;
use state::{spawn_session_sweeper, AppState};

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Form support
        .route("/api/states", get(handle_list_states))
        // Intake sessions
        .route("/api/sessions", post(handle_create_session))
        .route("/api/sessions/:id", get(handle_get_session))
        .route("/api/sessions/:id/submit", post(handle_submit))
        .route("/api/sessions/:id/confirm", post(handle_confirm))
        .route("/api/sessions/:id/abandon", post(handle_abandon))
        .route("/api/sessions/:id/reset", post(handle_reset))
        // Committed submissions
        .route("/api/submissions", get(handle_list_submissions))
        .route("/api/artifacts/*path", get(handle_get_artifact))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive(log_level.into())
                .add_directive("tower_http=debug".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Initializing consent API...");
    let state = Arc::new(AppState::from_args(&args).await?);
    spawn_session_sweeper(Arc::clone(&state));
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Consent API listening on http://{}", addr);
    info!("I/O timeout: {}ms", args.io_timeout_ms);
    info!("Idle sessions evicted after {}s", args.session_ttl_secs);

    axum::serve(listener, app).await?;

    Ok(())
}
