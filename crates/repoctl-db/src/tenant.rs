//! Tenant queries (§3 "Tenant").

use sqlx::{FromRow, PgPool, Postgres, Transaction};

use repoctl_types::{BuildToolchain, Tenant};

#[derive(Debug, FromRow)]
struct TenantRow {
    id: String,
    private: bool,
    interactive: Option<String>,
    created_at: i64,
    archived: bool,
    service_type: Option<String>,
    service_id: Option<String>,
    service_data: Option<serde_json::Value>,
    service_ref_count: Option<i32>,
    queued_at: Option<i64>,
    toolchain_name: Option<String>,
    toolchain_version: Option<String>,
    unloaded_at: Option<i64>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        use repoctl_types::{TenantService, Timestamp};
        Tenant {
            id: row.id,
            private: row.private,
            interactive: row.interactive,
            created_at: Timestamp::from_nanos(row.created_at),
            archived: row.archived,
            service: match (row.service_type, row.service_id) {
                (Some(service_type), Some(id)) => Some(TenantService {
                    service_type,
                    id,
                    data: row.service_data,
                    ref_count: row.service_ref_count.unwrap_or(0).max(0) as u32,
                }),
                _ => None,
            },
            queued_at: row.queued_at.map(Timestamp::from_nanos),
            toolchain: match (row.toolchain_name, row.toolchain_version) {
                (Some(name), Some(version)) => Some(BuildToolchain { name, version }),
                _ => None,
            },
            unloaded_at: row.unloaded_at.map(Timestamp::from_nanos),
        }
    }
}

pub async fn fetch_tenant(pool: &PgPool, id: &str) -> sqlx::Result<Option<Tenant>> {
    let row: Option<TenantRow> = sqlx::query_as(
        r#"SELECT id, private, interactive, created_at, archived,
                  service_type, service_id, service_data, service_ref_count,
                  queued_at, toolchain_name, toolchain_version, unloaded_at
           FROM tenants WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Tenant::from))
}

/// Same lookup as `fetch_tenant`, but within an already-open
/// transaction — `repoctl-tenant`'s cancel-by-id and load paths read
/// the tenant inside the same transaction they update it in.
pub async fn fetch_tenant_tx(tx: &mut Transaction<'_, Postgres>, id: &str) -> sqlx::Result<Option<Tenant>> {
    let row: Option<TenantRow> = sqlx::query_as(
        r#"SELECT id, private, interactive, created_at, archived,
                  service_type, service_id, service_data, service_ref_count,
                  queued_at, toolchain_name, toolchain_version, unloaded_at
           FROM tenants WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(Tenant::from))
}

pub async fn upsert_tenant(tx: &mut Transaction<'_, Postgres>, tenant: &Tenant) -> sqlx::Result<()> {
    let (service_type, service_id, service_data, service_ref_count) = match &tenant.service {
        Some(s) => (
            Some(s.service_type.as_str()),
            Some(s.id.as_str()),
            s.data.clone(),
            Some(s.ref_count as i32),
        ),
        None => (None, None, None, None),
    };
    let (toolchain_name, toolchain_version) = match &tenant.toolchain {
        Some(t) => (Some(t.name.as_str()), Some(t.version.as_str())),
        None => (None, None),
    };

    sqlx::query(
        r#"INSERT INTO tenants
             (id, private, interactive, created_at, archived,
              service_type, service_id, service_data, service_ref_count,
              queued_at, toolchain_name, toolchain_version, unloaded_at)
           VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
           ON CONFLICT (id) DO UPDATE SET
             private = EXCLUDED.private,
             interactive = EXCLUDED.interactive,
             archived = EXCLUDED.archived,
             service_type = EXCLUDED.service_type,
             service_id = EXCLUDED.service_id,
             service_data = EXCLUDED.service_data,
             service_ref_count = EXCLUDED.service_ref_count,
             queued_at = EXCLUDED.queued_at,
             toolchain_name = EXCLUDED.toolchain_name,
             toolchain_version = EXCLUDED.toolchain_version,
             unloaded_at = EXCLUDED.unloaded_at"#,
    )
    .bind(&tenant.id)
    .bind(tenant.private)
    .bind(&tenant.interactive)
    .bind(tenant.created_at.as_nanos())
    .bind(tenant.archived)
    .bind(service_type)
    .bind(service_id)
    .bind(service_data)
    .bind(service_ref_count)
    .bind(tenant.queued_at.map(|t| t.as_nanos()))
    .bind(toolchain_name)
    .bind(toolchain_version)
    .bind(tenant.unloaded_at.map(|t| t.as_nanos()))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Increment or decrement a tenant's service ref-count (§4.5
/// "ref-counted cancellation"). Returns the resulting count.
pub async fn adjust_service_ref_count(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: &str,
    delta: i32,
) -> sqlx::Result<i32> {
    let (count,): (i32,) = sqlx::query_as(
        r#"UPDATE tenants SET service_ref_count = GREATEST(service_ref_count + $2, 0)
           WHERE id = $1 RETURNING service_ref_count"#,
    )
    .bind(tenant_id)
    .bind(delta)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count)
}

pub async fn delete_tenant(tx: &mut Transaction<'_, Postgres>, id: &str) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM tenants WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Every archived, unloaded, or plain-active tenant for wipe-before-load
/// in single-tenant mode (§4.1 "empty means single-tenant mode, in
/// which case all tenants are wiped before loading").
pub async fn delete_all_tenants(tx: &mut Transaction<'_, Postgres>) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM tenants").execute(&mut **tx).await?;
    Ok(())
}

/// Every live tenant with a registered service, for the monitor-facing
/// stalled-notification read model (§4.5).
pub async fn list_serviced_tenants(pool: &PgPool) -> sqlx::Result<Vec<Tenant>> {
    let rows: Vec<TenantRow> = sqlx::query_as(
        r#"SELECT id, private, interactive, created_at, archived,
                  service_type, service_id, service_data, service_ref_count,
                  queued_at, toolchain_name, toolchain_version, unloaded_at
           FROM tenants WHERE service_type IS NOT NULL AND NOT archived"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Tenant::from).collect())
}
