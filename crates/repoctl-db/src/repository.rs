//! Repository queries (§3 "Repository").

use sqlx::{FromRow, PgPool, Postgres, Transaction};

use repoctl_types::{Certificate, Repository};

#[derive(Debug, FromRow)]
struct RepositoryRow {
    tenant: String,
    canonical_name: String,
    location: String,
    display_name: String,
    priority: i32,
    internal: bool,
    buildable: bool,
    cache_location: Option<String>,
    certificate_fingerprint: Option<String>,
    certificate_pem: Option<String>,
    packages_timestamp: i64,
    repositories_timestamp: i64,
    complements: Vec<String>,
    prerequisites: Vec<String>,
}

impl From<RepositoryRow> for Repository {
    fn from(row: RepositoryRow) -> Self {
        use repoctl_types::Timestamp;
        Repository {
            tenant: row.tenant,
            canonical_name: row.canonical_name,
            location: row.location,
            display_name: row.display_name,
            priority: row.priority as u16,
            internal: row.internal,
            buildable: row.buildable,
            cache_location: row.cache_location,
            certificate: match (row.certificate_fingerprint, row.certificate_pem) {
                (Some(fingerprint), Some(pem)) => Some(Certificate { fingerprint, pem }),
                _ => None,
            },
            packages_timestamp: Timestamp::from_nanos(row.packages_timestamp),
            repositories_timestamp: Timestamp::from_nanos(row.repositories_timestamp),
            complements: row.complements,
            prerequisites: row.prerequisites,
        }
    }
}

pub async fn fetch_repository(
    pool: &PgPool,
    tenant: &str,
    canonical_name: &str,
) -> sqlx::Result<Option<Repository>> {
    let row: Option<RepositoryRow> = sqlx::query_as(
        r#"SELECT tenant, canonical_name, location, display_name, priority, internal,
                  buildable, cache_location, certificate_fingerprint, certificate_pem,
                  packages_timestamp, repositories_timestamp, complements, prerequisites
           FROM repositories WHERE tenant = $1 AND canonical_name = $2"#,
    )
    .bind(tenant)
    .bind(canonical_name)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Repository::from))
}

pub async fn list_repositories(pool: &PgPool, tenant: &str) -> sqlx::Result<Vec<Repository>> {
    let rows: Vec<RepositoryRow> = sqlx::query_as(
        r#"SELECT tenant, canonical_name, location, display_name, priority, internal,
                  buildable, cache_location, certificate_fingerprint, certificate_pem,
                  packages_timestamp, repositories_timestamp, complements, prerequisites
           FROM repositories WHERE tenant = $1"#,
    )
    .bind(tenant)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Repository::from).collect())
}

pub async fn upsert_repository(
    tx: &mut Transaction<'_, Postgres>,
    repo: &Repository,
) -> sqlx::Result<()> {
    let (fingerprint, pem) = match &repo.certificate {
        Some(c) => (Some(c.fingerprint.as_str()), Some(c.pem.as_str())),
        None => (None, None),
    };
    sqlx::query(
        r#"INSERT INTO repositories
             (tenant, canonical_name, location, display_name, priority, internal,
              buildable, cache_location, certificate_fingerprint, certificate_pem,
              packages_timestamp, repositories_timestamp, complements, prerequisites)
           VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
           ON CONFLICT (tenant, canonical_name) DO UPDATE SET
             location = EXCLUDED.location,
             display_name = EXCLUDED.display_name,
             priority = EXCLUDED.priority,
             internal = EXCLUDED.internal,
             buildable = EXCLUDED.buildable,
             cache_location = EXCLUDED.cache_location,
             certificate_fingerprint = EXCLUDED.certificate_fingerprint,
             certificate_pem = EXCLUDED.certificate_pem,
             packages_timestamp = EXCLUDED.packages_timestamp,
             repositories_timestamp = EXCLUDED.repositories_timestamp,
             complements = EXCLUDED.complements,
             prerequisites = EXCLUDED.prerequisites"#,
    )
    .bind(&repo.tenant)
    .bind(&repo.canonical_name)
    .bind(&repo.location)
    .bind(&repo.display_name)
    .bind(repo.priority as i32)
    .bind(repo.internal)
    .bind(repo.buildable)
    .bind(&repo.cache_location)
    .bind(fingerprint)
    .bind(pem)
    .bind(repo.packages_timestamp.as_nanos())
    .bind(repo.repositories_timestamp.as_nanos())
    .bind(&repo.complements)
    .bind(&repo.prerequisites)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn delete_repository(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &str,
    canonical_name: &str,
) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM repositories WHERE tenant = $1 AND canonical_name = $2")
        .bind(tenant)
        .bind(canonical_name)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
