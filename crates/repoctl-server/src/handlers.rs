//! Route handlers (§6 "External interfaces"). Each handler's body runs
//! inside `spawn_blocking` via `run_blocking` (see `lib.rs`): the
//! per-request work mixes async `sqlx` calls with the synchronous
//! `reqwest::blocking` tenant-service client, so it must not run inline
//! on an async worker thread.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use repoctl_error::{ClientError, RepoError};
use repoctl_intake::IntakeProcessor;
use repoctl_scheduler::Dispatcher;
use repoctl_types::Timestamp;
use repoctl_types::protocol::{ResultRequest, TaskRequest, TaskResponse};

use crate::ApiError;
use crate::state::AppState;

/// Moves `f` (which itself drives async work via `Handle::block_on`)
/// onto the blocking thread pool and converts its outcome into an
/// `ApiError`.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, RepoError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(join_err) => Err(ApiError::from(RepoError::Fatal(join_err.into()))),
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn build_task(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    if !state.config.build_endpoints_enabled() {
        return Err(ApiError::from(RepoError::Client(ClientError::MissingField(
            "build-config is not set; build endpoints are disabled".into(),
        ))));
    }

    run_blocking(move || {
        let handle = tokio::runtime::Handle::current();
        handle.block_on(async move {
            let dispatcher = Dispatcher {
                pool: &state.pool,
                config: &state.config,
                configs: &state.target_configs,
                bot_agent_keys: state.bot_agent_keys.as_ref(),
                service_client: state.service_client.as_ref(),
            };
            dispatcher.dispatch(&request, false, Timestamp::now()).await
        })
    })
    .await
    .map(Json)
}

pub async fn build_result(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResultRequest>,
) -> Result<StatusCode, ApiError> {
    run_blocking(move || {
        let handle = tokio::runtime::Handle::current();
        handle.block_on(async move {
            let processor = IntakeProcessor {
                pool: &state.pool,
                config: &state.config,
                email_sink: state.email_sink.as_ref(),
                service_client: state.service_client.as_ref(),
            };
            processor.handle_result(&request, Timestamp::now()).await
        })
    })
    .await
    .map(|_| StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct CiSubmitRequest {
    pub service_type: String,
    pub service_id: String,
    pub service_data: Option<serde_json::Value>,
    pub repository: String,
    #[serde(default)]
    pub notify_interval_secs: Option<i64>,
    #[serde(default)]
    pub notify_delay_secs: Option<i64>,
}

/// `POST /ci`: register a new unloaded tenant for an external CI
/// submission (§4.4 "create"), then run the shared start routine with
/// `service_action: start`.
pub async fn ci_submit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CiSubmitRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    run_blocking(move || {
        let handle = tokio::runtime::Handle::current();
        handle.block_on(async move {
            let service = repoctl_types::TenantService::new(
                body.service_type.clone(),
                body.service_id.clone(),
                body.service_data.clone(),
            );
            let notify_interval = repoctl_types::Duration::from_secs(body.notify_interval_secs.unwrap_or(60));
            let notify_delay = repoctl_types::Duration::from_secs(body.notify_delay_secs.unwrap_or(0));

            let outcome = repoctl_tenant::create_unloaded_tenant(
                &state.pool,
                service,
                notify_interval,
                notify_delay,
                state.config.ci.duplicate_tenant_mode,
            )
            .await?;

            let tenant_id = match &outcome {
                repoctl_tenant::CreateOutcome::Created(id)
                | repoctl_tenant::CreateOutcome::Ignored(id)
                | repoctl_tenant::CreateOutcome::Replaced(id) => id.clone(),
            };

            let submission = repoctl_types::protocol::CiSubmission {
                id: tenant_id.clone(),
                repository: body.repository,
                package: vec![],
                timestamp: chrono::Utc::now().to_rfc3339(),
                client_ip: None,
                user_agent: None,
                interactive: None,
                simulate: None,
                service_id: Some(body.service_id),
                service_type: Some(body.service_type),
                service_data: None,
                service_action: Some(repoctl_types::protocol::ServiceAction::Start),
                custom: vec![],
            };

            let started = repoctl_tenant::start::run_start(
                &state.config.ci,
                &submission,
                None,
                state.ci_email_sink.as_ref(),
            )
            .map_err(|e| RepoError::Recoverable(e.into()))?;

            Ok(json!({
                "tenant_id": tenant_id,
                "outcome": format!("{outcome:?}"),
                "result": started.result,
            }))
        })
    })
    .await
    .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct CiLoadRequest {
    pub service_type: String,
    pub service_id: String,
    pub repository: String,
}

/// `POST /ci/load`: load an existing unloaded tenant (§4.4 "load").
pub async fn ci_load(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CiLoadRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    run_blocking(move || {
        let handle = tokio::runtime::Handle::current();
        handle.block_on(async move {
            let started = repoctl_tenant::load_tenant(
                &state.pool,
                &state.config.ci,
                &body.service_type,
                &body.service_id,
                &body.repository,
                state.ci_email_sink.as_ref(),
            )
            .await?;
            Ok(json!({ "result": started.result }))
        })
    })
    .await
    .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct CiCancelRequest {
    pub service_type: String,
    pub service_id: String,
}

/// `POST /ci/cancel`: ref-count-decrementing cancel by `(type, id)`
/// (§4.4 "cancel").
pub async fn ci_cancel(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CiCancelRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    run_blocking(move || {
        let handle = tokio::runtime::Handle::current();
        handle.block_on(async move {
            let service = repoctl_tenant::cancel_by_service(&state.pool, &body.service_type, &body.service_id).await?;
            Ok(json!({ "canceled": service.is_some() }))
        })
    })
    .await
    .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct MonitorQuery {
    #[serde(default = "default_notify_interval_secs")]
    pub notify_interval_secs: i64,
}

fn default_notify_interval_secs() -> i64 {
    60
}

/// `GET /monitor/stalled`: the §4.5 monitor read model.
pub async fn monitor_stalled(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonitorQuery>,
) -> Result<Json<Vec<repoctl_tenant::StalledTenant>>, ApiError> {
    run_blocking(move || {
        let handle = tokio::runtime::Handle::current();
        handle.block_on(async move {
            let notify_interval = repoctl_types::Duration::from_secs(query.notify_interval_secs);
            repoctl_tenant::stalled_notifications(&state.pool, Timestamp::now(), notify_interval)
                .await
                .map_err(|e| RepoError::Recoverable(Box::new(e)))
        })
    })
    .await
    .map(Json)
}
