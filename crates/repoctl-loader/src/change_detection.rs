//! Change detection (§4.1 "Change detection").

use repoctl_types::{LoadtabEntry, Repository, Timestamp};

/// Whether `entry` requires the tenant's whole package model to be
/// rebuilt, given the previously-persisted `existing` repository (if
/// any) and the current on-disk manifest mtimes.
pub fn requires_reload(
    entry: &LoadtabEntry,
    existing: Option<&Repository>,
    packages_mtime: Timestamp,
    repositories_mtime: Timestamp,
    forced: bool,
) -> bool {
    if forced {
        return true;
    }
    let Some(existing) = existing else {
        return true; // new repository
    };
    if existing.location != entry.location || existing.display_name != entry.display_name {
        return true; // renamed or relocated
    }
    if existing.cache_location.as_deref() != Some(entry.cache.as_str()) {
        return true; // cache path changed
    }
    if existing.buildable != entry.buildable.unwrap_or(existing.buildable) {
        return true; // buildable flag changed
    }
    if existing.packages_timestamp != packages_mtime || existing.repositories_timestamp != repositories_mtime {
        return true; // manifest mtimes changed
    }
    false
}

/// Internal repositories present in the DB but missing from the
/// current `loadtab` — their tenant requires a reload too (§4.1).
pub fn orphaned_repositories<'a>(
    persisted: &'a [Repository],
    loadtab: &[LoadtabEntry],
) -> Vec<&'a Repository> {
    persisted
        .iter()
        .filter(|r| r.internal && !loadtab.iter().any(|e| e.location == r.location))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LoadtabEntry {
        LoadtabEntry {
            location: "https://example.com/stable".into(),
            display_name: "Stable".into(),
            cache: "/cache/stable".into(),
            fingerprint: None,
            buildable: Some(true),
        }
    }

    fn repo() -> Repository {
        Repository {
            tenant: String::new(),
            canonical_name: "stable".into(),
            location: "https://example.com/stable".into(),
            display_name: "Stable".into(),
            priority: 1,
            internal: true,
            buildable: true,
            cache_location: Some("/cache/stable".into()),
            certificate: None,
            packages_timestamp: Timestamp::from_nanos(100),
            repositories_timestamp: Timestamp::from_nanos(200),
            complements: vec![],
            prerequisites: vec![],
        }
    }

    #[test]
    fn new_repository_always_reloads() {
        assert!(requires_reload(&entry(), None, Timestamp::from_nanos(100), Timestamp::from_nanos(200), false));
    }

    #[test]
    fn unchanged_repository_skips_reload() {
        assert!(!requires_reload(
            &entry(),
            Some(&repo()),
            Timestamp::from_nanos(100),
            Timestamp::from_nanos(200),
            false
        ));
    }

    #[test]
    fn changed_mtime_forces_reload() {
        assert!(requires_reload(
            &entry(),
            Some(&repo()),
            Timestamp::from_nanos(101),
            Timestamp::from_nanos(200),
            false
        ));
    }

    #[test]
    fn forced_always_reloads() {
        assert!(requires_reload(
            &entry(),
            Some(&repo()),
            Timestamp::from_nanos(100),
            Timestamp::from_nanos(200),
            true
        ));
    }

    #[test]
    fn orphaned_repositories_detects_removed_internal_entries() {
        let mut gone = repo();
        gone.location = "https://example.com/gone".into();
        let persisted = vec![repo(), gone];
        let loadtab = vec![entry()];
        let orphans = orphaned_repositories(&persisted, &loadtab);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].location, "https://example.com/gone");
    }
}
