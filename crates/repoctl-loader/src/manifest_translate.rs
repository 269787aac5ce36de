//! Translates the generic `repoctl_types::manifest` name/value records
//! into `Package`/`Repository` values (§4.1 Pass 1/Pass 2). This is
//! deliberately not a full bpkg/bdep package-manifest grammar — only
//! the fields this crate's data model actually stores (§1 Non-goals:
//! "does not ... parse package manifests" beyond that).

use repoctl_types::manifest::ManifestRecord;
use repoctl_types::{
    Certificate, Dependency, DependencyAlternative, DependencyGroup, EmailKind, Package,
    PackageConfig, PackageEmail, Repository, TestDependency, TestKind, Timestamp, Version,
    VersionConstraint,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("package record missing required field {0:?}")]
    MissingField(&'static str),
    #[error("malformed dependency spec {0:?}")]
    MalformedDependency(String),
}

fn parse_dependency(spec: &str) -> Result<Dependency, TranslateError> {
    let spec = spec.trim();
    let mut parts = spec.splitn(2, char::is_whitespace);
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TranslateError::MalformedDependency(spec.to_string()))?
        .to_string();
    let constraint = match parts.next().map(str::trim) {
        None | Some("") => None,
        Some(rest) => Some(parse_constraint(rest)?),
    };
    Ok(Dependency { name, constraint, resolved: None })
}

fn parse_constraint(rest: &str) -> Result<VersionConstraint, TranslateError> {
    let err = || TranslateError::MalformedDependency(rest.to_string());
    let (op, ver) = rest.split_once(char::is_whitespace).ok_or_else(err)?;
    let version = Version::new(0, ver.trim(), None);
    match op {
        "==" => Ok(VersionConstraint::Exact(version)),
        ">=" => Ok(VersionConstraint::AtLeast(version)),
        ">" => Ok(VersionConstraint::GreaterThan(version)),
        "<=" => Ok(VersionConstraint::AtMost(version)),
        "<" => Ok(VersionConstraint::LessThan(version)),
        _ => Err(err()),
    }
}

fn dependency_group(line: &str) -> Result<DependencyGroup, TranslateError> {
    let alternatives = line
        .split('|')
        .map(parse_dependency)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DependencyGroup(vec![DependencyAlternative(alternatives)]))
}

/// Translates one `packages.manifest` record into a `Package` belonging
/// to `internal_repository` (the repository it was just loaded from).
pub fn package_from_record(
    tenant: &str,
    internal_repository: &str,
    record: &ManifestRecord,
) -> Result<Package, TranslateError> {
    let name = record.get("name").ok_or(TranslateError::MissingField("name"))?.to_string();
    let version = record.get("version").ok_or(TranslateError::MissingField("version"))?;
    let project = record.get("project").unwrap_or(&name).to_string();
    let summary = record.get("summary").unwrap_or_default().to_string();

    let dependencies = record
        .get_all("depends")
        .map(dependency_group)
        .collect::<Result<Vec<_>, _>>()?;

    let tests = record
        .get_all("tests")
        .map(|l| Ok((parse_dependency(l)?, TestKind::Tests)))
        .chain(record.get_all("examples").map(|l| Ok((parse_dependency(l)?, TestKind::Examples))))
        .chain(record.get_all("benchmarks").map(|l| Ok((parse_dependency(l)?, TestKind::Benchmarks))))
        .map(|r: Result<(Dependency, TestKind), TranslateError>| {
            r.map(|(dependency, test_kind)| TestDependency { dependency, test_kind })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let emails = record
        .get_all("email")
        .map(|a| PackageEmail { address: a.to_string(), kind: EmailKind::Build })
        .chain(
            record
                .get_all("build-warning-email")
                .map(|a| PackageEmail { address: a.to_string(), kind: EmailKind::Warning }),
        )
        .chain(
            record
                .get_all("build-error-email")
                .map(|a| PackageEmail { address: a.to_string(), kind: EmailKind::Error }),
        )
        .collect();

    let build_configs = record
        .get_all("build-config")
        .map(|entry| {
            let mut tokens = entry.split_whitespace();
            let name = tokens.next().unwrap_or("default").to_string();
            let arguments = tokens.map(str::to_string).collect();
            PackageConfig { name, arguments, bot_keys: vec![] }
        })
        .collect::<Vec<_>>();

    let mut package = Package {
        tenant: tenant.to_string(),
        name,
        version: Version::new(0, version, None),
        upstream_version: record.get("upstream-version").map(str::to_string),
        project,
        summary,
        license_alternatives: record
            .get_all("license")
            .map(|l| l.split('|').map(|s| s.trim().to_string()).collect())
            .collect(),
        topics: record.get_all("topics").map(str::to_string).collect(),
        keywords: record.get_all("keywords").map(str::to_string).collect(),
        description: record.get("description").map(str::to_string),
        changes: record.get("changes").map(str::to_string),
        urls: record.get_all("url").map(str::to_string).collect(),
        emails,
        dependencies,
        requirements: record.get_all("requires").map(str::to_string).collect(),
        tests,
        build_constraints: record.get_all("build-exclude").map(str::to_string).collect(),
        build_auxiliaries: record.get_all("build-auxiliary").map(str::to_string).collect(),
        build_bot_keys: record.get_all("build-bot-key").map(str::to_string).collect(),
        build_configs,
        location: record.get("location").map(str::to_string),
        fragment: record.get("fragment").map(str::to_string),
        sha256sum: record.get("sha256sum").map(str::to_string),
        internal_repository: Some(internal_repository.to_string()),
        other_repositories: vec![],
        buildable: true,
        unbuildable_reason: None,
        custom_bot: None,
    };
    package.recompute_custom_bot();
    Ok(package)
}

/// Translates one `repositories.manifest` record, filling in the cache
/// location and manifest mtimes the loader observed on disk.
pub fn repository_from_record(
    tenant: &str,
    record: &ManifestRecord,
    cache_location: Option<String>,
    packages_timestamp: Timestamp,
    repositories_timestamp: Timestamp,
) -> Result<Repository, TranslateError> {
    let canonical_name = record
        .get("name")
        .ok_or(TranslateError::MissingField("name"))?
        .to_string();
    let location = record
        .get("location")
        .ok_or(TranslateError::MissingField("location"))?
        .to_string();
    let display_name = record.get("display-name").unwrap_or(&canonical_name).to_string();
    let internal = record.get("role").map(|r| r == "complement" || r.is_empty()).unwrap_or(true);
    let priority: u16 = record
        .get("priority")
        .and_then(|p| p.parse().ok())
        .unwrap_or(if internal { 1 } else { 0 });
    let certificate = match (record.get("certificate-fingerprint"), record.get("certificate")) {
        (Some(fingerprint), Some(pem)) => Some(Certificate {
            fingerprint: fingerprint.to_string(),
            pem: pem.to_string(),
        }),
        _ => None,
    };

    Ok(Repository {
        tenant: tenant.to_string(),
        canonical_name,
        location,
        display_name,
        priority,
        internal,
        buildable: internal && record.get("buildable").map(|b| b != "no").unwrap_or(true),
        cache_location,
        certificate,
        packages_timestamp,
        repositories_timestamp,
        complements: record.get_all("complements").map(str::to_string).collect(),
        prerequisites: record.get_all("prerequisite").map(str::to_string).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoctl_types::manifest::parse_record;

    #[test]
    fn translates_minimal_package() {
        let record = parse_record("name: libfoo\nversion: 1.2.2\nsummary: a library\n").unwrap();
        let pkg = package_from_record("acme", "stable", &record).unwrap();
        assert_eq!(pkg.name, "libfoo");
        assert_eq!(pkg.version.upstream, "1.2.2");
        assert_eq!(pkg.internal_repository.as_deref(), Some("stable"));
    }

    #[test]
    fn translates_dependency_alternatives() {
        let record =
            parse_record("name: libfoo\nversion: 1.0.0\ndepends: libbar >= 2.0.0 | libbaz\n").unwrap();
        let pkg = package_from_record("acme", "stable", &record).unwrap();
        assert_eq!(pkg.dependencies.len(), 1);
        assert_eq!(pkg.dependencies[0].0[0].0.len(), 2);
        assert_eq!(pkg.dependencies[0].0[0].0[0].name, "libbar");
    }

    #[test]
    fn missing_name_is_rejected() {
        let record = parse_record("version: 1.0.0\n").unwrap();
        assert_eq!(
            package_from_record("acme", "stable", &record),
            Err(TranslateError::MissingField("name"))
        );
    }

    #[test]
    fn translates_repository_record() {
        let record = parse_record("name: stable\nlocation: https://example.com/stable\n").unwrap();
        let repo = repository_from_record(
            "acme",
            &record,
            Some("/cache/stable".into()),
            Timestamp::from_nanos(1),
            Timestamp::from_nanos(2),
        )
        .unwrap();
        assert_eq!(repo.canonical_name, "stable");
        assert!(repo.internal);
    }
}
