//! Session validation (§4.3 "Session validation"): pure checks over an
//! already-fetched `Build`, separate from the lookup itself so the
//! invariant is directly testable.

use repoctl_types::{Build, BuildState, ResultStatus, SessionParts};

/// A build row whose state disagrees with what the session and the
/// reported result promised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The build is not currently `building`.
    NotBuilding,
    /// The session's encoded timestamp does not match the build's
    /// `timestamp` field.
    TimestampMismatch,
}

/// §4.3 "a build not in `building` state, or a build whose timestamp
/// disagrees with the session".
pub fn validate(build: &Build, session: &SessionParts) -> Result<(), ValidationFailure> {
    if build.state != BuildState::Building {
        return Err(ValidationFailure::NotBuilding);
    }
    if build.timestamp != session.timestamp {
        return Err(ValidationFailure::TimestampMismatch);
    }
    Ok(())
}

/// §4.3 "silently accept if the result is `abort`/`abnormal` because
/// the build-machine timeout is a plausible explanation" — whether a
/// validation failure (missing config/package/build, or one of the
/// mismatches above) should be swallowed rather than logged as a
/// protocol violation.
pub fn silently_acceptable(status: ResultStatus) -> bool {
    status.is_plausible_timeout_explanation()
}

/// §4.3 "If agent authentication is configured, verify the challenge
/// using the stored challenge bytes and the agent's key" — simplified
/// here to a direct comparison against the challenge stashed on the
/// build at dispatch time (§4.2), since per-agent key verification is
/// `repoctl-webhook`'s HMAC concern, not this crate's.
pub fn challenge_matches(build: &Build, reported_challenge_hex: Option<&str>) -> bool {
    match (&build.agent_challenge, reported_challenge_hex) {
        (Some(stored), Some(reported)) => stored.to_hex() == reported,
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoctl_types::{Challenge, ChecksumTriple, ForceState, Timestamp};

    fn building_build(timestamp: Timestamp) -> Build {
        Build {
            tenant: "t".into(),
            package_name: "libx".into(),
            package_version: "1.0".into(),
            target: "x86_64-linux-gnu".into(),
            target_config_name: "linux-gcc".into(),
            package_config_name: "default".into(),
            toolchain_name: "gcc".into(),
            toolchain_version: "13".into(),
            state: BuildState::Building,
            status: None,
            force: ForceState::Unforced,
            timestamp,
            soft_timestamp: timestamp,
            hard_timestamp: timestamp,
            completion_timestamp: None,
            interactive: None,
            agent_fingerprint: None,
            agent_challenge: Some(Challenge::generate(timestamp)),
            machine: "m".into(),
            auxiliary_machines: vec![],
            controller_checksum: "c".into(),
            machine_checksum: "m".into(),
            checksums: ChecksumTriple::default(),
            results: vec![],
        }
    }

    fn session_for(timestamp: Timestamp) -> SessionParts {
        SessionParts {
            tenant: "t".into(),
            name: "libx".into(),
            version: "1.0".into(),
            target: "x86_64-linux-gnu".into(),
            target_config: "linux-gcc".into(),
            package_config: "default".into(),
            toolchain_name: "gcc".into(),
            toolchain_version: "13".into(),
            timestamp,
        }
    }

    #[test]
    fn matching_session_validates() {
        let now = Timestamp::from_nanos(10);
        assert!(validate(&building_build(now), &session_for(now)).is_ok());
    }

    #[test]
    fn non_building_state_fails() {
        let now = Timestamp::from_nanos(10);
        let mut build = building_build(now);
        build.state = BuildState::Built;
        assert_eq!(
            validate(&build, &session_for(now)),
            Err(ValidationFailure::NotBuilding)
        );
    }

    #[test]
    fn mismatched_timestamp_fails() {
        let now = Timestamp::from_nanos(10);
        let build = building_build(now);
        let session = session_for(Timestamp::from_nanos(11));
        assert_eq!(
            validate(&build, &session),
            Err(ValidationFailure::TimestampMismatch)
        );
    }

    #[test]
    fn abort_and_abnormal_are_silently_acceptable() {
        assert!(silently_acceptable(ResultStatus::Abort));
        assert!(silently_acceptable(ResultStatus::Abnormal));
        assert!(!silently_acceptable(ResultStatus::Success));
    }

    #[test]
    fn challenge_mismatch_is_detected() {
        let now = Timestamp::from_nanos(1);
        let build = building_build(now);
        let real = build.agent_challenge.as_ref().unwrap().to_hex();
        assert!(challenge_matches(&build, Some(&real)));
        assert!(!challenge_matches(&build, Some("deadbeef")));
        assert!(!challenge_matches(&build, None));
    }
}
