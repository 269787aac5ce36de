//! Load (§4.4): given an existing unloaded tenant identified by
//! `(type, id)`, clear `unloaded_at` and delegate to the shared
//! `start` routine with `service_action: load`.

use sqlx::PgPool;

use repoctl_config::CiConfig;
use repoctl_error::{ClientError, RepoError};
use repoctl_retry::RetryPolicy;
use repoctl_types::protocol::{CiSubmission, ServiceAction};

use crate::email::CiEmailSink;
use crate::start::{StartOutcome, run_start};

fn wrap_db(e: sqlx::Error) -> RepoError {
    RepoError::Recoverable(Box::new(e))
}

fn rejected(reason: &str) -> RepoError {
    RepoError::Client(ClientError::InvalidParameter {
        name: "service".into(),
        reason: reason.into(),
    })
}

enum LoadTxOutcome {
    NotFound,
    NotLoadable,
    Loaded(String),
}

/// Clears `unloaded_at` on the tenant registered under
/// `(service_type, service_id)` and runs the CI handler against
/// `repository`.
pub async fn load_tenant(
    pool: &PgPool,
    ci_config: &CiConfig,
    service_type: &str,
    service_id: &str,
    repository: &str,
    email_sink: &dyn CiEmailSink,
) -> Result<StartOutcome, RepoError> {
    let service_type_owned = service_type.to_string();
    let service_id_owned = service_id.to_string();

    let outcome = repoctl_db::serializable_transaction(pool, RetryPolicy::Aggressive, |tx| {
        let service_type = service_type_owned.clone();
        let service_id = service_id_owned.clone();
        async move {
            let Some(tenant) = repoctl_db::service::find_tenant_by_service_key(tx, &service_type, &service_id).await?
            else {
                return Ok(LoadTxOutcome::NotFound);
            };
            if tenant.archived || !tenant.is_unloaded() {
                return Ok(LoadTxOutcome::NotLoadable);
            }

            let mut loaded = tenant.clone();
            loaded.unloaded_at = None;
            repoctl_db::tenant::upsert_tenant(tx, &loaded).await?;
            Ok(LoadTxOutcome::Loaded(tenant.id))
        }
    })
    .await
    .map_err(wrap_db)?;

    let tenant_id = match outcome {
        LoadTxOutcome::NotFound => return Err(rejected("no tenant registered for this service")),
        LoadTxOutcome::NotLoadable => return Err(rejected("tenant is already archived or already loaded")),
        LoadTxOutcome::Loaded(id) => id,
    };

    let submission = CiSubmission {
        id: tenant_id,
        repository: repository.to_string(),
        package: vec![],
        timestamp: chrono::Utc::now().to_rfc3339(),
        client_ip: None,
        user_agent: None,
        interactive: None,
        simulate: None,
        service_id: Some(service_id.to_string()),
        service_type: Some(service_type.to_string()),
        service_data: None,
        service_action: Some(ServiceAction::Load),
        custom: vec![],
    };

    run_start(ci_config, &submission, None, email_sink).map_err(|e| RepoError::Recoverable(e.into()))
}
