//! Pure helpers for the build scheduler (§4.2) kept here, not in
//! `repoctl-scheduler`, so they are testable without a database: the
//! per-tuple RAM budget check, rebuild-candidate priority ordering, and
//! the target-configuration class model (§9 "a sum type
//! `BuildTargetConfig{…}` plus an interface-style `belongs(config,
//! class)` predicate over a class-inheritance map kept as a simple
//! adjacency representation").

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::build::{ForceState, ResultStatus};
use crate::timestamp::Timestamp;

/// A named build-target configuration: which machine name pattern it
/// serves, and which classes it belongs to (e.g. `"linux"`, `"bsd"`)
/// for `build-exclude` matching against a package's `build_constraints`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTargetConfig {
    pub name: String,
    /// Glob pattern (`*` wildcard only) matched against an offered
    /// machine's name, e.g. `"x86_64-*-linux-gnu"`.
    pub pattern: String,
    pub classes: Vec<String>,
}

/// The full target-configuration table plus a class-inheritance
/// adjacency (class -> parent classes), loaded once at startup (§5
/// "Shared state").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfigMap {
    pub configs: Vec<BuildTargetConfig>,
    pub class_parents: BTreeMap<String, Vec<String>>,
}

impl TargetConfigMap {
    pub fn find(&self, name: &str) -> Option<&BuildTargetConfig> {
        self.configs.iter().find(|c| c.name == name)
    }

    /// First configuration whose pattern matches `machine_name`.
    pub fn matching(&self, machine_name: &str) -> Option<&BuildTargetConfig> {
        self.configs.iter().find(|c| glob_match(&c.pattern, machine_name))
    }

    /// Whether `config_name` belongs to `class`, directly or through
    /// the class-inheritance closure.
    pub fn belongs(&self, config_name: &str, class: &str) -> bool {
        let Some(config) = self.find(config_name) else {
            return false;
        };
        let mut frontier: Vec<String> = config.classes.clone();
        let mut seen = BTreeSet::new();
        while let Some(c) = frontier.pop() {
            if c == class {
                return true;
            }
            if !seen.insert(c.clone()) {
                continue;
            }
            if let Some(parents) = self.class_parents.get(&c) {
                frontier.extend(parents.clone());
            }
        }
        false
    }
}

/// Minimal glob matcher supporting a single `*` wildcard, enough for
/// the machine-name patterns target configurations are keyed by.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == candidate,
        Some((prefix, suffix)) => {
            candidate.len() >= prefix.len() + suffix.len()
                && candidate.starts_with(prefix)
                && candidate.ends_with(suffix)
        }
    }
}

/// Auxiliary machine names have the form `arch-os…` (§4.2); the
/// derived configuration name strips the first dash-component.
pub fn derive_config_name(machine_name: &str) -> Option<&str> {
    machine_name.split_once('-').map(|(_, rest)| rest)
}

/// Whether adding `candidate_minimum` more RAM to `used` stays within
/// `budget` (§4.2 "a machine whose RAM minimum fits under the task's
/// global RAM budget"). `budget` of 0 means unconstrained.
pub fn fits_ram_budget(used: u64, candidate_minimum: u64, budget: u64) -> bool {
    budget == 0 || used.saturating_add(candidate_minimum) <= budget
}

/// Sort key for rebuild-candidate priority (§4.2/§8 "Rebuild fairness":
/// `(force desc, status desc, soft_timestamp asc)`). Wrap in
/// `Reverse` for the first two fields when sorting ascending, or just
/// sort by this tuple descending on the first two and ascending on the
/// third via a custom `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildPriority {
    force_rank: u8,
    status_rank: u8,
    soft_timestamp: Timestamp,
}

impl RebuildPriority {
    pub fn new(force: ForceState, status: ResultStatus, soft_timestamp: Timestamp) -> Self {
        Self {
            force_rank: force_rank(force),
            status_rank: status_rank(status),
            soft_timestamp,
        }
    }
}

impl PartialOrd for RebuildPriority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RebuildPriority {
    /// "Greater" means "selected first": higher force/status rank
    /// wins, and among ties the older `soft_timestamp` wins.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.force_rank
            .cmp(&other.force_rank)
            .then(self.status_rank.cmp(&other.status_rank))
            .then(other.soft_timestamp.cmp(&self.soft_timestamp))
    }
}

fn force_rank(force: ForceState) -> u8 {
    match force {
        ForceState::Forced => 2,
        ForceState::Forcing => 1,
        ForceState::Unforced => 0,
    }
}

fn status_rank(status: ResultStatus) -> u8 {
    match status {
        ResultStatus::Abort => 6,
        ResultStatus::Abnormal => 5,
        ResultStatus::Error => 4,
        ResultStatus::Interrupt => 3,
        ResultStatus::Warning => 2,
        ResultStatus::Skip => 1,
        ResultStatus::Success => 0,
    }
}

/// Picks the highest-priority rebuild candidate (§8 "Rebuild
/// fairness"), or `None` if `candidates` is empty.
pub fn pick_rebuild_candidate<T>(candidates: Vec<(RebuildPriority, T)>) -> Option<T> {
    candidates.into_iter().max_by_key(|(p, _)| *p).map(|(_, t)| t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_handles_prefix_and_suffix() {
        assert!(glob_match("x86_64-*-linux-gnu", "x86_64-pc-linux-gnu"));
        assert!(!glob_match("x86_64-*-linux-gnu", "arm-pc-linux-gnu"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }

    #[test]
    fn derive_config_name_strips_first_component() {
        assert_eq!(derive_config_name("x86_64-linux-gnu"), Some("linux-gnu"));
        assert_eq!(derive_config_name("noarch"), None);
    }

    #[test]
    fn ram_budget_allows_unconstrained_when_zero() {
        assert!(fits_ram_budget(1_000_000, 999_999_999, 0));
    }

    #[test]
    fn ram_budget_rejects_when_exceeded() {
        assert!(!fits_ram_budget(900, 200, 1000));
        assert!(fits_ram_budget(900, 100, 1000));
    }

    #[test]
    fn rebuild_priority_prefers_forced_over_unforced() {
        let forced = RebuildPriority::new(ForceState::Forced, ResultStatus::Success, Timestamp::from_nanos(100));
        let unforced = RebuildPriority::new(ForceState::Unforced, ResultStatus::Error, Timestamp::from_nanos(0));
        assert!(forced > unforced);
    }

    #[test]
    fn rebuild_priority_breaks_ties_on_older_soft_timestamp() {
        let older = RebuildPriority::new(ForceState::Unforced, ResultStatus::Success, Timestamp::from_nanos(0));
        let newer = RebuildPriority::new(ForceState::Unforced, ResultStatus::Success, Timestamp::from_nanos(100));
        assert!(older > newer);
    }

    #[test]
    fn pick_rebuild_candidate_returns_highest_priority() {
        let low = RebuildPriority::new(ForceState::Unforced, ResultStatus::Success, Timestamp::from_nanos(50));
        let high = RebuildPriority::new(ForceState::Forced, ResultStatus::Success, Timestamp::from_nanos(50));
        let picked = pick_rebuild_candidate(vec![(low, "low"), (high, "high")]);
        assert_eq!(picked, Some("high"));
    }

    #[test]
    fn target_config_map_resolves_class_inheritance() {
        let map = TargetConfigMap {
            configs: vec![BuildTargetConfig {
                name: "linux-gcc".into(),
                pattern: "x86_64-*-linux-gnu".into(),
                classes: vec!["linux".into()],
            }],
            class_parents: BTreeMap::from([("linux".to_string(), vec!["unix".to_string()])]),
        };
        assert!(map.belongs("linux-gcc", "linux"));
        assert!(map.belongs("linux-gcc", "unix"));
        assert!(!map.belongs("linux-gcc", "bsd"));
    }
}
