//! Tenant-service lookups (§3 "Tenant service", §4.4 "duplicate tenant
//! handling on `(service.type, service.id)` collision").

use sqlx::{FromRow, Postgres, Transaction};

use repoctl_types::{BuildToolchain, Tenant, TenantService, Timestamp};

#[derive(FromRow)]
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

/// Find the tenant currently registered under `(service_type, id)`, if
/// any — the collision check for CI `create` (§4.4).
pub async fn find_tenant_by_service_key(
    tx: &mut Transaction<'_, Postgres>,
    service_type: &str,
    id: &str,
) -> sqlx::Result<Option<Tenant>> {
    let row: Option<TenantRow> = sqlx::query_as(
        r#"SELECT id, private, interactive, created_at, archived,
                  service_type, service_id, service_data, service_ref_count,
                  queued_at, toolchain_name, toolchain_version, unloaded_at
           FROM tenants WHERE service_type = $1 AND service_id = $2"#,
    )
    .bind(service_type)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(Tenant::from))
}
