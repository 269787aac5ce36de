//! Interrupt handling (§4.3 "Interrupt"): the agent gave up on a task
//! without reporting a terminal status. Pure transform over an
//! already-fetched `Build`; the caller decides whether to persist,
//! delete, or recreate based on the returned outcome.

use repoctl_types::{Build, BuildState, ForceState};

#[derive(Debug, Clone, PartialEq)]
pub enum InterruptOutcome {
    /// §4.3 "Revert to `built` if this was a rebuild": the build had
    /// completed before, so a previous status exists to fall back to.
    RevertToBuilt(Build),
    /// §4.3 "For initial builds ... delete the build" when no
    /// `service_build_queued` callback is registered.
    Delete,
    /// §4.3 "... or, if a `service_build_queued` callback is
    /// registered, re-create it as a blank `queued` row".
    RecreateQueued(Build),
}

/// `has_queued_callback` reflects whether the owning tenant has a
/// service registered, since `service_build_queued` only fires for
/// tenants with one (§4.2 "Tenant-service notifications").
pub fn apply_interrupt(build: &Build, has_queued_callback: bool) -> InterruptOutcome {
    if build.has_completed() {
        let mut reverted = build.clone();
        reverted.state = BuildState::Built;
        if reverted.force == ForceState::Forcing {
            reverted.force = ForceState::Forced;
        }
        reverted.interactive = None;
        reverted.agent_fingerprint = None;
        reverted.agent_challenge = None;
        return InterruptOutcome::RevertToBuilt(reverted);
    }

    if !has_queued_callback {
        return InterruptOutcome::Delete;
    }

    let mut blank = build.clone();
    blank.state = BuildState::Queued;
    blank.force = ForceState::Unforced;
    blank.status = None;
    blank.completion_timestamp = None;
    blank.interactive = None;
    blank.agent_fingerprint = None;
    blank.agent_challenge = None;
    blank.checksums = repoctl_types::ChecksumTriple::default();
    blank.results = Vec::new();
    InterruptOutcome::RecreateQueued(blank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoctl_types::{ChecksumTriple, OperationResult, ResultStatus, Timestamp};

    fn base_build(status: Option<ResultStatus>, force: ForceState) -> Build {
        let now = Timestamp::from_nanos(100);
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
            status,
            force,
            timestamp: now,
            soft_timestamp: Timestamp::from_nanos(50),
            hard_timestamp: Timestamp::from_nanos(50),
            completion_timestamp: status.map(|_| Timestamp::from_nanos(50)),
            interactive: Some("login".into()),
            agent_fingerprint: Some("fp".into()),
            agent_challenge: None,
            machine: "m".into(),
            auxiliary_machines: vec![],
            controller_checksum: "c".into(),
            machine_checksum: "m".into(),
            checksums: ChecksumTriple::default(),
            results: vec![OperationResult {
                operation: "build".into(),
                status: ResultStatus::Success,
                log: String::new(),
            }],
        }
    }

    #[test]
    fn rebuild_interrupt_reverts_to_built_and_clears_agent_fields() {
        let build = base_build(Some(ResultStatus::Success), ForceState::Forcing);
        let outcome = apply_interrupt(&build, true);
        match outcome {
            InterruptOutcome::RevertToBuilt(b) => {
                assert_eq!(b.state, BuildState::Built);
                assert_eq!(b.force, ForceState::Forced);
                assert_eq!(b.status, Some(ResultStatus::Success));
                assert!(b.interactive.is_none());
                assert_eq!(b.timestamp, Timestamp::from_nanos(100));
            }
            other => panic!("expected RevertToBuilt, got {other:?}"),
        }
    }

    #[test]
    fn initial_build_interrupt_without_callback_deletes() {
        let build = base_build(None, ForceState::Unforced);
        assert_eq!(apply_interrupt(&build, false), InterruptOutcome::Delete);
    }

    #[test]
    fn initial_build_interrupt_with_callback_recreates_as_queued() {
        let build = base_build(None, ForceState::Unforced);
        match apply_interrupt(&build, true) {
            InterruptOutcome::RecreateQueued(b) => {
                assert_eq!(b.state, BuildState::Queued);
                assert!(b.checksums.is_complete() == false);
                assert!(b.results.is_empty());
            }
            other => panic!("expected RecreateQueued, got {other:?}"),
        }
    }
}
