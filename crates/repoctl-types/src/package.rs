use serde::{Deserialize, Serialize};

use crate::version::{Version, VersionConstraint};

/// `{(tenant, name, canonical_version), ...}` (§3 "Package").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub tenant: String,
    pub name: String,
    pub version: Version,
    pub upstream_version: Option<String>,
    pub project: String,
    pub summary: String,
    pub license_alternatives: Vec<Vec<String>>,
    pub topics: Vec<String>,
    pub keywords: Vec<String>,
    pub description: Option<String>,
    pub changes: Option<String>,
    pub urls: Vec<String>,
    pub emails: Vec<PackageEmail>,
    pub dependencies: Vec<DependencyGroup>,
    pub requirements: Vec<String>,
    pub tests: Vec<TestDependency>,
    pub build_constraints: Vec<String>,
    pub build_auxiliaries: Vec<String>,
    pub build_bot_keys: Vec<String>,
    pub build_configs: Vec<PackageConfig>,
    pub location: Option<String>,
    pub fragment: Option<String>,
    pub sha256sum: Option<String>,
    pub internal_repository: Option<String>,
    pub other_repositories: Vec<String>,
    pub buildable: bool,
    pub unbuildable_reason: Option<UnbuildableReason>,
    pub custom_bot: Option<bool>,
}

impl Package {
    /// A package is internal iff it has an `internal_repository` (§3).
    pub fn is_internal(&self) -> bool {
        self.internal_repository.is_some()
    }

    /// Re-derive `custom_bot` from the set of configurations' bot-key
    /// requirements: `true` if every configuration requires custom bot
    /// keys, `false` if none do, absent if mixed (§3 Package
    /// invariant).
    pub fn recompute_custom_bot(&mut self) {
        if self.build_configs.is_empty() {
            self.custom_bot = None;
            return;
        }
        let all_custom = self.build_configs.iter().all(|c| !c.bot_keys.is_empty());
        let none_custom = self.build_configs.iter().all(|c| c.bot_keys.is_empty());
        self.custom_bot = if all_custom {
            Some(true)
        } else if none_custom {
            Some(false)
        } else {
            None
        };
    }

    /// Append `repository` to `other_repositories` when the same
    /// package is seen again from a different repository during the
    /// loader's pass 1 (§4.1).
    pub fn record_other_repository(&mut self, repository: String) {
        if self.internal_repository.as_deref() != Some(repository.as_str())
            && !self.other_repositories.contains(&repository)
        {
            self.other_repositories.push(repository);
        }
    }
}

/// §3 "`unbuildable_reason` enumerates why" — stubs, tests belonging
/// only to a primary package, and external/unbuildable packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnbuildableReason {
    Stub,
    Test,
    External,
    Unbuildable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEmail {
    pub address: String,
    pub kind: EmailKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    Build,
    Warning,
    Error,
}

/// A named build variant with its own arguments, emails, constraints,
/// and bot keys (GLOSSARY "Package configuration").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    pub arguments: Vec<String>,
    pub bot_keys: Vec<String>,
}

impl PackageConfig {
    /// The configuration's effective bot keys (§4.2 pre-checks): empty
    /// means "any default bot", non-empty means only those fingerprints
    /// may build it as a custom bot.
    pub fn effective_bot_keys(&self) -> &[String] {
        &self.bot_keys
    }
}

/// A single concrete dependency with an optional version constraint and
/// a lazily resolved back-reference (§3 "dependencies is a 2-level
/// nested structure").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub constraint: Option<VersionConstraint>,
    /// Resolved at dependency-resolution time (§4.1); `None` until then.
    pub resolved: Option<ResolvedDependency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub name: String,
    pub version: Version,
}

/// An `or`-alternative list of concrete dependencies: any one of these
/// satisfies the group member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyAlternative(pub Vec<Dependency>);

/// A sequence of alternatives, all of which must be satisfied (`and`
/// across alternatives, `or` within one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGroup(pub Vec<DependencyAlternative>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDependency {
    pub dependency: Dependency,
    pub test_kind: TestKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Tests,
    Examples,
    Benchmarks,
}

/// `{(tenant, fingerprint), data}` (§3 "Public key").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub tenant: String,
    pub fingerprint: String,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(bot_keys: Vec<&str>) -> PackageConfig {
        PackageConfig {
            name: "default".into(),
            arguments: vec![],
            bot_keys: bot_keys.into_iter().map(String::from).collect(),
        }
    }

    fn base_package() -> Package {
        Package {
            tenant: String::new(),
            name: "libfoo".into(),
            version: Version::new(0, "1.2.2", None),
            upstream_version: None,
            project: "libfoo".into(),
            summary: String::new(),
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
            location: None,
            fragment: None,
            sha256sum: None,
            internal_repository: Some("stable".into()),
            other_repositories: vec![],
            buildable: true,
            unbuildable_reason: None,
            custom_bot: None,
        }
    }

    #[test]
    fn custom_bot_true_when_all_configs_custom() {
        let mut p = base_package();
        p.build_configs = vec![config(vec!["abc"]), config(vec!["def"])];
        p.recompute_custom_bot();
        assert_eq!(p.custom_bot, Some(true));
    }

    #[test]
    fn custom_bot_false_when_no_configs_custom() {
        let mut p = base_package();
        p.build_configs = vec![config(vec![]), config(vec![])];
        p.recompute_custom_bot();
        assert_eq!(p.custom_bot, Some(false));
    }

    #[test]
    fn custom_bot_absent_when_mixed() {
        let mut p = base_package();
        p.build_configs = vec![config(vec!["abc"]), config(vec![])];
        p.recompute_custom_bot();
        assert_eq!(p.custom_bot, None);
    }

    #[test]
    fn is_internal_tracks_internal_repository() {
        let mut p = base_package();
        assert!(p.is_internal());
        p.internal_repository = None;
        assert!(!p.is_internal());
    }

    #[test]
    fn record_other_repository_dedups() {
        let mut p = base_package();
        p.record_other_repository("math".into());
        p.record_other_repository("math".into());
        p.record_other_repository("stable".into()); // == internal, skipped
        assert_eq!(p.other_repositories, vec!["math".to_string()]);
    }
}
