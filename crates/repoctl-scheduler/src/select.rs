//! Pure selection-loop logic (§4.2 "Selection loop"): given the builds
//! that already exist for a package/version/target-config/toolchain
//! tuple, decide whether a never-built package configuration or a
//! rebuild candidate should be dispatched.

use repoctl_types::{
    pick_rebuild_candidate, Build, BuildState, Duration, ForceState, RebuildPriority, ResultStatus,
    Timestamp,
};

/// One candidate this package/target-config/toolchain combination could
/// still dispatch: either a package configuration with no `Build` row
/// yet, or an existing row eligible for rebuild.
#[derive(Debug, Clone)]
pub enum Candidate {
    New { package_config_name: String },
    Rebuild { build: Build },
}

impl Candidate {
    pub fn package_config_name(&self) -> &str {
        match self {
            Candidate::New { package_config_name } => package_config_name,
            Candidate::Rebuild { build } => &build.package_config_name,
        }
    }
}

/// §4.2 "a rebuild is due if the build is `queued` past the queued
/// timeout, or `built` with `force` set, or `built` with a non-success
/// status past the soft-rebuild timeout". A `building` build is never a
/// rebuild candidate — it is still in flight.
pub fn is_rebuild_eligible(
    build: &Build,
    now: Timestamp,
    soft_rebuild_timeout: Duration,
    queued_timeout: Duration,
) -> bool {
    match build.state {
        BuildState::Queued => build.timestamp.is_older_than(now, queued_timeout),
        BuildState::Building => false,
        BuildState::Built => {
            build.force == ForceState::Forced
                || build.force == ForceState::Forcing
                || (build.status != Some(ResultStatus::Success)
                    && build.soft_timestamp.is_older_than(now, soft_rebuild_timeout))
        }
    }
}

/// Build the candidate list across a package's configurations for one
/// `(target, target_config, toolchain)` combination (§4.2 step 3
/// "gather candidates").
pub fn gather_candidates(
    package_config_names: &[String],
    target: &str,
    target_config_name: &str,
    toolchain_name: &str,
    toolchain_version: &str,
    existing: &[Build],
    now: Timestamp,
    soft_rebuild_timeout: Duration,
    queued_timeout: Duration,
) -> Vec<Candidate> {
    package_config_names
        .iter()
        .filter_map(|package_config_name| {
            let found = existing.iter().find(|b| {
                b.target == target
                    && b.target_config_name == target_config_name
                    && b.package_config_name == *package_config_name
                    && b.toolchain_name == toolchain_name
                    && b.toolchain_version == toolchain_version
            });
            match found {
                None => Some(Candidate::New {
                    package_config_name: package_config_name.clone(),
                }),
                Some(build) if is_rebuild_eligible(build, now, soft_rebuild_timeout, queued_timeout) => {
                    Some(Candidate::Rebuild { build: build.clone() })
                }
                Some(_) => None,
            }
        })
        .collect()
}

/// §4.2/§8 "Task uniqueness"/"Rebuild fairness": never-built tuples take
/// priority over rebuild candidates; among rebuild candidates, priority
/// follows `(force desc, status desc, soft_timestamp asc)`. Returns at
/// most one candidate, which is what makes a single tuple's selection
/// unique per call.
pub fn pick(candidates: Vec<Candidate>) -> Option<Candidate> {
    let (new, rebuild): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|c| matches!(c, Candidate::New { .. }));
    if let Some(first) = new.into_iter().next() {
        return Some(first);
    }
    let ranked: Vec<(RebuildPriority, Candidate)> = rebuild
        .into_iter()
        .map(|c| {
            let priority = match &c {
                Candidate::Rebuild { build } => RebuildPriority::new(
                    build.force,
                    build.status.unwrap_or(ResultStatus::Success),
                    build.soft_timestamp,
                ),
                Candidate::New { .. } => unreachable!("new candidates already partitioned out"),
            };
            (priority, c)
        })
        .collect();
    pick_rebuild_candidate(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoctl_types::{Challenge, ChecksumTriple};

    fn built_build(force: ForceState, status: ResultStatus, soft_timestamp: i64) -> Build {
        Build {
            tenant: String::new(),
            package_name: "libfoo".into(),
            package_version: "1.0".into(),
            target: "x86_64-linux-gnu".into(),
            target_config_name: "linux-gcc".into(),
            package_config_name: "default".into(),
            toolchain_name: "gcc".into(),
            toolchain_version: "13".into(),
            state: BuildState::Built,
            status: Some(status),
            force,
            timestamp: Timestamp::from_nanos(soft_timestamp),
            soft_timestamp: Timestamp::from_nanos(soft_timestamp),
            hard_timestamp: Timestamp::from_nanos(soft_timestamp),
            completion_timestamp: Some(Timestamp::from_nanos(soft_timestamp)),
            interactive: None,
            agent_fingerprint: None,
            agent_challenge: None::<Challenge>,
            machine: "box1".into(),
            auxiliary_machines: vec![],
            controller_checksum: "c".into(),
            machine_checksum: "m".into(),
            checksums: ChecksumTriple::default(),
            results: vec![],
        }
    }

    #[test]
    fn never_built_configuration_beats_any_rebuild_candidate() {
        let existing = vec![built_build(ForceState::Forced, ResultStatus::Error, 0)];
        let candidates = gather_candidates(
            &["default".into(), "alt".into()],
            "x86_64-linux-gnu",
            "linux-gcc",
            "gcc",
            "13",
            &existing,
            Timestamp::from_nanos(1_000_000_000),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        let picked = pick(candidates).unwrap();
        assert_eq!(picked.package_config_name(), "alt");
    }

    #[test]
    fn successful_recent_build_is_not_a_candidate() {
        let existing = vec![built_build(ForceState::Unforced, ResultStatus::Success, 900_000_000_000)];
        let candidates = gather_candidates(
            &["default".into()],
            "x86_64-linux-gnu",
            "linux-gcc",
            "gcc",
            "13",
            &existing,
            Timestamp::from_nanos(1_000_000_000),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        assert!(candidates.is_empty());
    }

    #[test]
    fn stale_building_is_not_rebuild_eligible() {
        let mut building = built_build(ForceState::Unforced, ResultStatus::Success, 0);
        building.state = BuildState::Building;
        assert!(!is_rebuild_eligible(&building, Timestamp::from_nanos(1_000_000_000_000), Duration::from_secs(1), Duration::from_secs(1)));
    }

    #[test]
    fn rebuild_fairness_prefers_forced_then_older_soft_timestamp() {
        let candidates = vec![
            Candidate::Rebuild { build: built_build(ForceState::Unforced, ResultStatus::Error, 500) },
            Candidate::Rebuild { build: built_build(ForceState::Forced, ResultStatus::Success, 900) },
            Candidate::Rebuild { build: built_build(ForceState::Unforced, ResultStatus::Error, 100) },
        ];
        let picked = pick(candidates).unwrap();
        match picked {
            Candidate::Rebuild { build } => assert_eq!(build.force, ForceState::Forced),
            Candidate::New { .. } => panic!("expected a rebuild candidate"),
        }
    }

    #[test]
    fn pick_returns_at_most_one_candidate() {
        let candidates = gather_candidates(
            &["a".into(), "b".into(), "c".into()],
            "x86_64-linux-gnu",
            "linux-gcc",
            "gcc",
            "13",
            &[],
            Timestamp::from_nanos(0),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );
        assert_eq!(candidates.len(), 3);
        assert!(pick(candidates).is_some());
    }
}
