//! Package queries (§3 "Package").
//!
//! The composite identity and the columns the scheduler/loader filter
//! or sort on (name, version components, `buildable`,
//! `internal_repository`) are real columns; the rest of the rich,
//! deeply-nested shape (dependencies, tests, configs, emails, ...) is
//! kept as a single JSONB blob, following the same "typed identity,
//! opaque payload" split used for `tenants.service_data`.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use repoctl_types::{
    DependencyGroup, Package, PackageConfig, PackageEmail, TestDependency, UnbuildableReason,
    Version,
};

#[derive(Debug, Serialize, Deserialize)]
struct PackageExtra {
    license_alternatives: Vec<Vec<String>>,
    topics: Vec<String>,
    keywords: Vec<String>,
    description: Option<String>,
    changes: Option<String>,
    urls: Vec<String>,
    emails: Vec<PackageEmail>,
    dependencies: Vec<DependencyGroup>,
    requirements: Vec<String>,
    tests: Vec<TestDependency>,
    build_constraints: Vec<String>,
    build_auxiliaries: Vec<String>,
    build_bot_keys: Vec<String>,
    build_configs: Vec<PackageConfig>,
}

#[derive(Debug, FromRow)]
struct PackageRow {
    tenant: String,
    name: String,
    epoch: i64,
    upstream: String,
    canonical_upstream: String,
    release: Option<String>,
    canonical_release: Option<String>,
    revision: Option<i32>,
    upstream_version: Option<String>,
    project: String,
    summary: String,
    location: Option<String>,
    fragment: Option<String>,
    sha256sum: Option<String>,
    internal_repository: Option<String>,
    other_repositories: Vec<String>,
    buildable: bool,
    unbuildable_reason: Option<String>,
    custom_bot: Option<bool>,
    extra: serde_json::Value,
}

impl From<PackageRow> for Package {
    fn from(row: PackageRow) -> Self {
        let extra: PackageExtra = serde_json::from_value(row.extra).unwrap_or(PackageExtra {
            license_alternatives: vec![],
            topics: vec![],
            keywords: vec![],
            description: None,
            changes: None,
            urls: vec![],
            emails: vec![],
            dependencies: vec![],
            requirements: vec![],
            tests: vec![],
            build_constraints: vec![],
            build_auxiliaries: vec![],
            build_bot_keys: vec![],
            build_configs: vec![],
        });
        Package {
            tenant: row.tenant,
            name: row.name,
            version: Version {
                epoch: row.epoch as u32,
                upstream: row.upstream,
                canonical_upstream: row.canonical_upstream,
                release: row.release,
                canonical_release: row.canonical_release,
                revision: row.revision.map(|r| r as u32),
            },
            upstream_version: row.upstream_version,
            project: row.project,
            summary: row.summary,
            license_alternatives: extra.license_alternatives,
            topics: extra.topics,
            keywords: extra.keywords,
            description: extra.description,
            changes: extra.changes,
            urls: extra.urls,
            emails: extra.emails,
            dependencies: extra.dependencies,
            requirements: extra.requirements,
            tests: extra.tests,
            build_constraints: extra.build_constraints,
            build_auxiliaries: extra.build_auxiliaries,
            build_bot_keys: extra.build_bot_keys,
            build_configs: extra.build_configs,
            location: row.location,
            fragment: row.fragment,
            sha256sum: row.sha256sum,
            internal_repository: row.internal_repository,
            other_repositories: row.other_repositories,
            buildable: row.buildable,
            unbuildable_reason: row.unbuildable_reason.and_then(|s| match s.as_str() {
                "stub" => Some(UnbuildableReason::Stub),
                "test" => Some(UnbuildableReason::Test),
                "external" => Some(UnbuildableReason::External),
                "unbuildable" => Some(UnbuildableReason::Unbuildable),
                _ => None,
            }),
            custom_bot: row.custom_bot,
        }
    }
}

fn unbuildable_reason_str(reason: Option<UnbuildableReason>) -> Option<&'static str> {
    reason.map(|r| match r {
        UnbuildableReason::Stub => "stub",
        UnbuildableReason::Test => "test",
        UnbuildableReason::External => "external",
        UnbuildableReason::Unbuildable => "unbuildable",
    })
}

pub async fn fetch_package(
    pool: &PgPool,
    tenant: &str,
    name: &str,
    canonical_upstream: &str,
    canonical_release: Option<&str>,
    revision: Option<i32>,
) -> sqlx::Result<Option<Package>> {
    let row: Option<PackageRow> = sqlx::query_as(
        r#"SELECT tenant, name, epoch, upstream, canonical_upstream, release,
                  canonical_release, revision, upstream_version, project, summary,
                  location, fragment, sha256sum, internal_repository, other_repositories,
                  buildable, unbuildable_reason, custom_bot, extra
           FROM packages
           WHERE tenant = $1 AND name = $2 AND canonical_upstream = $3
             AND canonical_release IS NOT DISTINCT FROM $4
             AND COALESCE(revision, 0) = COALESCE($5, 0)"#,
    )
    .bind(tenant)
    .bind(name)
    .bind(canonical_upstream)
    .bind(canonical_release)
    .bind(revision)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Package::from))
}

/// All versions of `name` ordered newest-first, the shape dependency
/// resolution needs (§4.1 "pick the highest that satisfies the
/// constraint").
pub async fn list_package_versions_desc(
    pool: &PgPool,
    tenant: &str,
    name: &str,
) -> sqlx::Result<Vec<Package>> {
    let rows: Vec<PackageRow> = sqlx::query_as(
        r#"SELECT tenant, name, epoch, upstream, canonical_upstream, release,
                  canonical_release, revision, upstream_version, project, summary,
                  location, fragment, sha256sum, internal_repository, other_repositories,
                  buildable, unbuildable_reason, custom_bot, extra
           FROM packages WHERE tenant = $1 AND name = $2
           ORDER BY epoch DESC, canonical_upstream DESC, canonical_release DESC NULLS LAST,
                    COALESCE(revision, 0) DESC"#,
    )
    .bind(tenant)
    .bind(name)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Package::from).collect())
}

/// Every buildable internal package across every tenant, in database
/// order (§4.2 "iterates buildable packages across tenants in either
/// database order or a randomized order"; this implementation always
/// uses database order — see DESIGN.md).
pub async fn list_buildable_packages(pool: &PgPool) -> sqlx::Result<Vec<Package>> {
    let rows: Vec<PackageRow> = sqlx::query_as(
        r#"SELECT tenant, name, epoch, upstream, canonical_upstream, release,
                  canonical_release, revision, upstream_version, project, summary,
                  location, fragment, sha256sum, internal_repository, other_repositories,
                  buildable, unbuildable_reason, custom_bot, extra
           FROM packages
           WHERE buildable = true AND internal_repository IS NOT NULL
           ORDER BY tenant, name, epoch DESC, canonical_upstream DESC"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Package::from).collect())
}

pub async fn upsert_package(tx: &mut Transaction<'_, Postgres>, package: &Package) -> sqlx::Result<()> {
    let extra = PackageExtra {
        license_alternatives: package.license_alternatives.clone(),
        topics: package.topics.clone(),
        keywords: package.keywords.clone(),
        description: package.description.clone(),
        changes: package.changes.clone(),
        urls: package.urls.clone(),
        emails: package.emails.clone(),
        dependencies: package.dependencies.clone(),
        requirements: package.requirements.clone(),
        tests: package.tests.clone(),
        build_constraints: package.build_constraints.clone(),
        build_auxiliaries: package.build_auxiliaries.clone(),
        build_bot_keys: package.build_bot_keys.clone(),
        build_configs: package.build_configs.clone(),
    };
    let extra_json = serde_json::to_value(&extra).expect("PackageExtra always serializes");

    sqlx::query(
        r#"INSERT INTO packages
             (tenant, name, epoch, upstream, canonical_upstream, release, canonical_release,
              revision, upstream_version, project, summary, location, fragment, sha256sum,
              internal_repository, other_repositories, buildable, unbuildable_reason,
              custom_bot, extra)
           VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20)
           ON CONFLICT (tenant, name, canonical_upstream, canonical_release, revision)
           DO UPDATE SET
             epoch = EXCLUDED.epoch,
             upstream = EXCLUDED.upstream,
             release = EXCLUDED.release,
             upstream_version = EXCLUDED.upstream_version,
             project = EXCLUDED.project,
             summary = EXCLUDED.summary,
             location = EXCLUDED.location,
             fragment = EXCLUDED.fragment,
             sha256sum = EXCLUDED.sha256sum,
             internal_repository = EXCLUDED.internal_repository,
             other_repositories = EXCLUDED.other_repositories,
             buildable = EXCLUDED.buildable,
             unbuildable_reason = EXCLUDED.unbuildable_reason,
             custom_bot = EXCLUDED.custom_bot,
             extra = EXCLUDED.extra"#,
    )
    .bind(&package.tenant)
    .bind(&package.name)
    .bind(package.version.epoch as i64)
    .bind(&package.version.upstream)
    .bind(&package.version.canonical_upstream)
    .bind(&package.version.release)
    .bind(&package.version.canonical_release)
    .bind(package.version.revision.map(|r| r as i32))
    .bind(&package.upstream_version)
    .bind(&package.project)
    .bind(&package.summary)
    .bind(&package.location)
    .bind(&package.fragment)
    .bind(&package.sha256sum)
    .bind(&package.internal_repository)
    .bind(&package.other_repositories)
    .bind(package.buildable)
    .bind(unbuildable_reason_str(package.unbuildable_reason))
    .bind(package.custom_bot)
    .bind(extra_json)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn upsert_public_key(
    tx: &mut Transaction<'_, Postgres>,
    key: &repoctl_types::PublicKey,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"INSERT INTO public_keys (tenant, fingerprint, data) VALUES ($1, $2, $3)
           ON CONFLICT (tenant, fingerprint) DO UPDATE SET data = EXCLUDED.data"#,
    )
    .bind(&key.tenant)
    .bind(&key.fingerprint)
    .bind(&key.data)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[derive(Debug, FromRow)]
struct PublicKeyRow {
    tenant: String,
    fingerprint: String,
    data: String,
}

impl From<PublicKeyRow> for repoctl_types::PublicKey {
    fn from(row: PublicKeyRow) -> Self {
        repoctl_types::PublicKey {
            tenant: row.tenant,
            fingerprint: row.fingerprint,
            data: row.data,
        }
    }
}

pub async fn fetch_public_key(
    pool: &PgPool,
    tenant: &str,
    fingerprint: &str,
) -> sqlx::Result<Option<repoctl_types::PublicKey>> {
    let row: Option<PublicKeyRow> = sqlx::query_as(
        "SELECT tenant, fingerprint, data FROM public_keys WHERE tenant = $1 AND fingerprint = $2",
    )
    .bind(tenant)
    .bind(fingerprint)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(Into::into))
}
