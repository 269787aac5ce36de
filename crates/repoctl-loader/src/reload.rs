//! Two-pass reload orchestration (§4.1 "Pass 1 — packages",
//! "Pass 2 — repositories").

use std::path::{Path, PathBuf};

use repoctl_config::IgnoreUnresolvedMode;
use repoctl_db::tx::serializable_transaction;
use repoctl_retry::RetryPolicy;
use repoctl_types::manifest::{LoadtabEntry, parse_records};
use repoctl_types::Timestamp;
use sqlx::PgPool;

use crate::change_detection::{orphaned_repositories, requires_reload};
use crate::fetch::{FetchError, fetch_with_retry};
use crate::manifest_translate::{TranslateError, package_from_record, repository_from_record};
use crate::reporter::Reporter;
use crate::resolve::{RepositoryGraph, ResolutionError, resolve_package};

#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to translate manifest record: {0}")]
    Translate(#[from] TranslateError),
    #[error(transparent)]
    Manifest(#[from] repoctl_types::manifest::ManifestParseError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Default)]
pub struct ReloadOutcome {
    pub reloaded_repositories: Vec<String>,
    pub skipped_repositories: Vec<String>,
    pub loaded_packages: usize,
    pub removed_repositories: Vec<String>,
}

/// Runs the full loader pass for one tenant's `loadtab` against the
/// persisted state, fetching and re-parsing only the repositories
/// `requires_reload` flags, then resolving dependencies across the
/// tenant's whole package set.
pub async fn reload_tenant(
    pool: &PgPool,
    tenant: &str,
    loadtab: &[LoadtabEntry],
    fetch_tool: &str,
    max_fetch_attempts: u32,
    forced: bool,
    ignore_unresolved: IgnoreUnresolvedMode,
    reporter: &mut dyn Reporter,
) -> Result<ReloadOutcome, ReloadError> {
    let persisted = repoctl_db::repository::list_repositories(pool, tenant).await?;
    let mut outcome = ReloadOutcome::default();

    for orphan in orphaned_repositories(&persisted, loadtab) {
        reporter.warn(&format!(
            "repository {} is no longer in loadtab, removing",
            orphan.canonical_name
        ));
        outcome.removed_repositories.push(orphan.canonical_name.clone());
    }
    let removed = outcome.removed_repositories.clone();

    for entry in loadtab {
        let cache_dir = PathBuf::from(&entry.cache);
        let packages_manifest = cache_dir.join("packages.manifest");
        let repositories_manifest = cache_dir.join("repositories.manifest");

        let existing = persisted.iter().find(|r| r.location == entry.location);
        let packages_mtime = mtime_of(&packages_manifest).unwrap_or(Timestamp::EPOCH);
        let repositories_mtime = mtime_of(&repositories_manifest).unwrap_or(Timestamp::EPOCH);

        if !requires_reload(entry, existing, packages_mtime, repositories_mtime, forced) {
            outcome.skipped_repositories.push(entry.display_name.clone());
            continue;
        }

        reporter.info(&format!("reloading {}", entry.display_name));
        fetch_with_retry(fetch_tool, &[&entry.location, "rep-info"], &cache_dir, max_fetch_attempts)?;

        let packages_text = std::fs::read_to_string(&packages_manifest)
            .map_err(|source| ReloadError::Io { path: packages_manifest.clone(), source })?;
        let repositories_text = std::fs::read_to_string(&repositories_manifest)
            .map_err(|source| ReloadError::Io { path: repositories_manifest.clone(), source })?;

        let repo_record = parse_records(&repositories_text)?
            .into_iter()
            .next()
            .ok_or(TranslateError::MissingField("name"))?;
        let repository = repository_from_record(
            tenant,
            &repo_record,
            Some(entry.cache.clone()),
            packages_mtime,
            repositories_mtime,
        )?;

        let package_records = parse_records(&packages_text)?;
        let mut packages = Vec::with_capacity(package_records.len());
        for record in &package_records {
            packages.push(package_from_record(tenant, &repository.canonical_name, record)?);
        }

        let loaded = packages.len();
        serializable_transaction(pool, RetryPolicy::Default, |tx| {
            let repository = repository.clone();
            let packages = packages.clone();
            async move {
                repoctl_db::repository::upsert_repository(tx, &repository).await?;
                for package in &packages {
                    repoctl_db::package::upsert_package(tx, package).await?;
                }
                Ok(())
            }
        })
        .await?;

        outcome.loaded_packages += loaded;
        outcome.reloaded_repositories.push(repository.canonical_name.clone());
    }

    if !removed.is_empty() {
        serializable_transaction(pool, RetryPolicy::Default, |tx| {
            let removed = removed.clone();
            let tenant = tenant.to_string();
            async move {
                for name in &removed {
                    repoctl_db::repository::delete_repository(tx, &tenant, name).await?;
                }
                Ok(())
            }
        })
        .await?;
    }

    resolve_all(pool, tenant, ignore_unresolved, reporter).await?;

    Ok(outcome)
}

/// §4.1 "Dependency resolution (post-load)": resolve every internal
/// package's dependencies and test dependencies against the tenant's
/// current package set, then check for cycles.
async fn resolve_all(
    pool: &PgPool,
    tenant: &str,
    ignore_unresolved: IgnoreUnresolvedMode,
    reporter: &mut dyn Reporter,
) -> Result<(), ReloadError> {
    let repositories = repoctl_db::repository::list_repositories(pool, tenant).await?;
    let graph = RepositoryGraph::build(&repositories);

    // Pull every version of every package up front so resolution can
    // run against an in-memory snapshot through a synchronous closure
    // rather than awaiting the pool mid-resolution.
    let all_names = distinct_package_names(pool, tenant).await?;
    let mut versions_by_name = std::collections::HashMap::new();
    for name in &all_names {
        let versions = repoctl_db::package::list_package_versions_desc(pool, tenant, name).await?;
        versions_by_name.insert(name.clone(), versions);
    }

    let candidates_by_name = |dep_name: &str| -> Vec<repoctl_types::Package> {
        versions_by_name.get(dep_name).cloned().unwrap_or_default()
    };

    let mut resolved = std::collections::HashMap::new();
    for versions in versions_by_name.values() {
        for package in versions {
            let mut package = package.clone();
            if package.is_internal() {
                resolve_package(&mut package, &candidates_by_name, &graph, ignore_unresolved)?;
            }
            resolved.insert(package.name.clone(), package);
        }
    }

    for name in resolved.keys() {
        if let Some(cycle) = crate::resolve::detect_cycle(&resolved, name) {
            reporter.error(&format!("dependency cycle: {}", cycle.join(" -> ")));
            return Err(ReloadError::Resolution(ResolutionError::Cycle(cycle)));
        }
    }

    let mut tx = pool.begin().await?;
    for package in resolved.values() {
        repoctl_db::package::upsert_package(&mut tx, package).await?;
    }
    tx.commit().await?;

    Ok(())
}

async fn distinct_package_names(pool: &PgPool, tenant: &str) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT name FROM packages WHERE tenant = $1")
        .bind(tenant)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(n,)| n).collect())
}

fn mtime_of(path: &Path) -> std::io::Result<Timestamp> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata.modified()?;
    let nanos = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    Ok(Timestamp::from_nanos(nanos))
}
