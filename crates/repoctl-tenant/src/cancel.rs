//! Cancel (§4.4): given a `(type, id)` service key or a raw tenant id,
//! decrement (or drop unconditionally) the service ref-count, deleting
//! an unloaded tenant or archiving a loaded one once it reaches zero.

use sqlx::PgPool;

use repoctl_error::RepoError;
use repoctl_retry::RetryPolicy;
use repoctl_types::TenantService;

fn wrap_db(e: sqlx::Error) -> RepoError {
    RepoError::Recoverable(Box::new(e))
}

/// Cancel by `(service.type, service.id)`. `decrement_ref_count`
/// matches the ref-counted path; passing `false` cancels
/// unconditionally regardless of how many other callers still hold a
/// reference. Returns the tenant's service state as it stood just
/// before this call took effect, or `None` if no such tenant exists.
pub async fn cancel_by_service(
    pool: &PgPool,
    service_type: &str,
    id: &str,
) -> Result<Option<TenantService>, RepoError> {
    cancel_by_service_impl(pool, service_type, id, true).await
}

/// Cancel by `(service.type, service.id)` unconditionally, dropping
/// the registration regardless of the current ref-count.
pub async fn cancel_by_service_unconditional(
    pool: &PgPool,
    service_type: &str,
    id: &str,
) -> Result<Option<TenantService>, RepoError> {
    cancel_by_service_impl(pool, service_type, id, false).await
}

async fn cancel_by_service_impl(
    pool: &PgPool,
    service_type: &str,
    id: &str,
    decrement_ref_count: bool,
) -> Result<Option<TenantService>, RepoError> {
    let service_type = service_type.to_string();
    let id = id.to_string();

    repoctl_db::serializable_transaction(pool, RetryPolicy::Aggressive, |tx| {
        let service_type = service_type.clone();
        let id = id.clone();
        async move {
            let Some(tenant) = repoctl_db::service::find_tenant_by_service_key(tx, &service_type, &id).await?
            else {
                return Ok(None);
            };
            let Some(mut service) = tenant.service.clone() else {
                return Ok(None);
            };

            let cancel = if decrement_ref_count {
                service.ref_count = service.ref_count.saturating_sub(1);
                service.ref_count == 0
            } else {
                true
            };

            if cancel {
                if tenant.is_unloaded() {
                    repoctl_db::tenant::delete_tenant(tx, &tenant.id).await?;
                } else {
                    let mut archived = tenant.clone();
                    archived.service = None;
                    archived.archived = true;
                    repoctl_db::tenant::upsert_tenant(tx, &archived).await?;
                }
            } else {
                let mut updated = tenant.clone();
                updated.service = Some(service.clone());
                repoctl_db::tenant::upsert_tenant(tx, &updated).await?;
            }

            Ok(Some(service))
        }
    })
    .await
    .map_err(wrap_db)
}

/// Cancel a tenant identified directly by its id, archiving it (or
/// deleting it if still unloaded) unconditionally. Returns `false` if
/// no such tenant exists.
pub async fn cancel_by_id(pool: &PgPool, tenant_id: &str, reason: &str) -> Result<bool, RepoError> {
    let tenant_id = tenant_id.to_string();
    let reason = reason.to_string();

    repoctl_db::serializable_transaction(pool, RetryPolicy::Aggressive, |tx| {
        let tenant_id = tenant_id.clone();
        let reason = reason.clone();
        async move {
            let Some(tenant) = repoctl_db::tenant::fetch_tenant_tx(tx, &tenant_id).await? else {
                return Ok(false);
            };

            if tenant.is_unloaded() {
                repoctl_db::tenant::delete_tenant(tx, &tenant.id).await?;
            } else if !tenant.archived {
                let mut archived = tenant.clone();
                archived.archived = true;
                repoctl_db::tenant::upsert_tenant(tx, &archived).await?;
            }

            tracing::info!(tenant = %tenant_id, %reason, "CI request canceled");
            Ok(true)
        }
    })
    .await
    .map_err(wrap_db)
}
