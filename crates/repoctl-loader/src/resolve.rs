//! Dependency resolution and cycle detection (§4.1 "Dependency
//! resolution (post-load)", "Cycle detection").

use std::collections::{HashMap, HashSet, VecDeque};

use repoctl_config::IgnoreUnresolvedMode;
use repoctl_types::{Dependency, Package, ResolvedDependency, TestKind};

/// Transitive-closure view over a tenant's repositories, built from
/// each repository's `complements`/`prerequisites` lists, used to
/// decide whether a candidate package is reachable from a dependent
/// package's repository (§4.1: "reachable ... via transitively-closed
/// complements (and, for non-test dependencies, immediate
/// prerequisites)").
pub struct RepositoryGraph {
    complements: HashMap<String, Vec<String>>,
    prerequisites: HashMap<String, Vec<String>>,
}

impl RepositoryGraph {
    pub fn build(repositories: &[repoctl_types::Repository]) -> Self {
        let mut complements = HashMap::new();
        let mut prerequisites = HashMap::new();
        for repo in repositories {
            complements.insert(repo.canonical_name.clone(), repo.complements.clone());
            prerequisites.insert(repo.canonical_name.clone(), repo.prerequisites.clone());
        }
        Self { complements, prerequisites }
    }

    /// Whether `candidate_repo` is reachable from `from_repo` via the
    /// transitive closure of complements, plus (if `include_prerequisites`)
    /// `from_repo`'s immediate prerequisites.
    pub fn reachable(&self, from_repo: &str, candidate_repo: &str, include_prerequisites: bool) -> bool {
        if from_repo == candidate_repo {
            return true;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(from_repo.to_string());
        seen.insert(from_repo.to_string());
        while let Some(repo) = queue.pop_front() {
            if repo == candidate_repo {
                return true;
            }
            if let Some(complements) = self.complements.get(&repo) {
                for c in complements {
                    if seen.insert(c.clone()) {
                        queue.push_back(c.clone());
                    }
                }
            }
        }
        if include_prerequisites {
            if let Some(prereqs) = self.prerequisites.get(from_repo) {
                return prereqs.iter().any(|p| p == candidate_repo);
            }
        }
        false
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("unresolved dependency {dependent} -> {name} (no reachable version satisfies the constraint)")]
    Unresolved { dependent: String, name: String },
    #[error("dependency cycle detected: {0:?}")]
    Cycle(Vec<String>),
}

/// Resolve every concrete dependency and test dependency on `package`
/// against `candidates_by_name`, honoring repository reachability and
/// the configured ignore-unresolved mode.
pub fn resolve_package(
    package: &mut Package,
    candidates_by_name: &dyn Fn(&str) -> Vec<Package>,
    graph: &RepositoryGraph,
    ignore: IgnoreUnresolvedMode,
) -> Result<(), ResolutionError> {
    let Some(from_repo) = package.internal_repository.clone() else {
        return Ok(());
    };

    for group in package.dependencies.iter_mut() {
        for alternative in group.0.iter_mut() {
            for dep in alternative.0.iter_mut() {
                resolve_one(
                    dep,
                    &package.name,
                    &from_repo,
                    candidates_by_name,
                    graph,
                    true,
                    matches!(ignore, IgnoreUnresolvedMode::All | IgnoreUnresolvedMode::ConditionalOnly),
                )?;
            }
        }
    }

    for test in package.tests.iter_mut() {
        let ignore_this = matches!(ignore, IgnoreUnresolvedMode::All | IgnoreUnresolvedMode::TestOnly);
        resolve_one(
            &mut test.dependency,
            &package.name,
            &from_repo,
            candidates_by_name,
            graph,
            test.test_kind != TestKind::Benchmarks,
            ignore_this,
        )?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn resolve_one(
    dep: &mut Dependency,
    dependent_name: &str,
    from_repo: &str,
    candidates_by_name: &dyn Fn(&str) -> Vec<Package>,
    graph: &RepositoryGraph,
    include_prerequisites: bool,
    tolerate_unresolved: bool,
) -> Result<(), ResolutionError> {
    let mut candidates = candidates_by_name(&dep.name);
    candidates.sort_by(|a, b| b.version.cmp(&a.version));

    let picked = candidates.into_iter().find(|candidate| {
        let version_ok = match &dep.constraint {
            Some(c) => c.satisfied_by(&candidate.version),
            None => true,
        };
        if !version_ok {
            return false;
        }
        match &candidate.internal_repository {
            Some(candidate_repo) => graph.reachable(from_repo, candidate_repo, include_prerequisites),
            None => false,
        }
    });

    match picked {
        Some(candidate) => {
            dep.resolved = Some(ResolvedDependency {
                name: candidate.name.clone(),
                version: candidate.version.clone(),
            });
            Ok(())
        }
        None if tolerate_unresolved => Ok(()),
        None => Err(ResolutionError::Unresolved {
            dependent: dependent_name.to_string(),
            name: dep.name.clone(),
        }),
    }
}

/// Depth-first cycle detection over resolved dependencies, comparing
/// package **names** (not versions) along the chain (§4.1 "Cycle
/// detection").
pub fn detect_cycle(packages: &HashMap<String, Package>, start: &str) -> Option<Vec<String>> {
    fn visit(
        packages: &HashMap<String, Package>,
        node: &str,
        path: &mut Vec<String>,
        on_path: &mut HashSet<String>,
    ) -> Option<Vec<String>> {
        if on_path.contains(node) {
            let mut cycle = path.clone();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        let Some(package) = packages.get(node) else {
            return None;
        };
        path.push(node.to_string());
        on_path.insert(node.to_string());

        for group in &package.dependencies {
            for alt in &group.0 {
                for dep in &alt.0 {
                    if dep.resolved.is_some() {
                        if let Some(cycle) = visit(packages, &dep.name, path, on_path) {
                            return Some(cycle);
                        }
                    }
                }
            }
        }

        path.pop();
        on_path.remove(node);
        None
    }

    let mut path = Vec::new();
    let mut on_path = HashSet::new();
    visit(packages, start, &mut path, &mut on_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoctl_types::{Dependency, DependencyAlternative, DependencyGroup, Version};

    fn pkg(name: &str, repo: &str, deps: Vec<&str>) -> Package {
        Package {
            tenant: String::new(),
            name: name.into(),
            version: Version::new(0, "1.0.0", None),
            upstream_version: None,
            project: name.into(),
            summary: String::new(),
            license_alternatives: vec![],
            topics: vec![],
            keywords: vec![],
            description: None,
            changes: None,
            urls: vec![],
            emails: vec![],
            dependencies: vec![DependencyGroup(
                deps.iter()
                    .map(|d| {
                        DependencyAlternative(vec![Dependency {
                            name: d.to_string(),
                            constraint: None,
                            resolved: Some(ResolvedDependency {
                                name: d.to_string(),
                                version: Version::new(0, "1.0.0", None),
                            }),
                        }])
                    })
                    .collect(),
            )],
            requirements: vec![],
            tests: vec![],
            build_constraints: vec![],
            build_auxiliaries: vec![],
            build_bot_keys: vec![],
            build_configs: vec![],
            location: None,
            fragment: None,
            sha256sum: None,
            internal_repository: Some(repo.into()),
            other_repositories: vec![],
            buildable: true,
            unbuildable_reason: None,
            custom_bot: None,
        }
    }

    #[test]
    fn reachable_via_direct_complement() {
        let repos = vec![repoctl_types::Repository {
            tenant: String::new(),
            canonical_name: "stable".into(),
            location: "l".into(),
            display_name: "d".into(),
            priority: 1,
            internal: true,
            buildable: true,
            cache_location: None,
            certificate: None,
            packages_timestamp: repoctl_types::Timestamp::now(),
            repositories_timestamp: repoctl_types::Timestamp::now(),
            complements: vec!["math".into()],
            prerequisites: vec![],
        }];
        let graph = RepositoryGraph::build(&repos);
        assert!(graph.reachable("stable", "math", false));
        assert!(!graph.reachable("stable", "unrelated", false));
    }

    #[test]
    fn detects_simple_cycle() {
        let mut packages = HashMap::new();
        packages.insert("a".to_string(), pkg("a", "stable", vec!["b"]));
        packages.insert("b".to_string(), pkg("b", "stable", vec!["a"]));
        let cycle = detect_cycle(&packages, "a");
        assert!(cycle.is_some());
    }

    #[test]
    fn no_cycle_in_acyclic_chain() {
        let mut packages = HashMap::new();
        packages.insert("a".to_string(), pkg("a", "stable", vec!["b"]));
        packages.insert("b".to_string(), pkg("b", "stable", vec![]));
        assert!(detect_cycle(&packages, "a").is_none());
    }
}
