//! `repoctl-server`: the HTTP surface over `repoctl-scheduler`,
//! `repoctl-intake`, and `repoctl-tenant` (§5, §6).
//!
//! §5 "each request is handled on a single thread from start to
//! finish" — this workspace's request handlers mix async `sqlx` calls
//! with the synchronous `reqwest::blocking` tenant-service client, so
//! each handler's body runs inside `tokio::task::spawn_blocking`
//! (`run_blocking`) rather than as plain `async fn` inline I/O. axum
//! still owns the listener and routing; only the per-request work
//! moves to the blocking pool.

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Builds the axum router for every route in §6.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/build-task", post(handlers::build_task))
        .route("/build-result", post(handlers::build_result))
        .route("/ci", post(handlers::ci_submit))
        .route("/ci/load", post(handlers::ci_load))
        .route("/ci/cancel", post(handlers::ci_cancel))
        .route("/monitor/stalled", get(handlers::monitor_stalled))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
