use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// `queued → building → built`; a `built` build may revert to
/// `building` on forced rebuild and then to `built` again (§3
/// "Build").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Queued,
    Building,
    Built,
}

/// `force ∈ {unforced, forcing, forced}`; `forcing` is only valid in
/// `building` (§3 "Build" invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceState {
    Unforced,
    Forcing,
    Forced,
}

/// `status ∈ {success, warning, error, abort, abnormal, skip,
/// interrupt}` (§6 "Result-request manifest"). `Skip` and `Interrupt`
/// are request-kinds reported by the agent rather than terminal
/// statuses persisted verbatim; they are included here because the
/// wire manifest carries them in the same `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Warning,
    Error,
    Abort,
    Abnormal,
    Skip,
    Interrupt,
}

impl ResultStatus {
    /// §4.3 "silently accept if the result is `abort`/`abnormal`" —
    /// these are plausibly explained by a build-machine timeout rather
    /// than a real protocol violation.
    pub fn is_plausible_timeout_explanation(self) -> bool {
        matches!(self, ResultStatus::Abort | ResultStatus::Abnormal)
    }

    /// Terminal statuses that can be persisted onto a `built` build row
    /// (everything except the two request-kind variants).
    pub fn is_terminal(self) -> bool {
        !matches!(self, ResultStatus::Skip | ResultStatus::Interrupt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation: String,
    pub status: ResultStatus,
    pub log: String,
}

/// Hierarchical checksums: `agent_checksum` covers `worker_checksum`
/// covers `dependency_checksum` (§3 "Build"). Clearing a higher
/// checksum forces re-execution of everything beneath (§8 "Checksum
/// hierarchy").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumTriple {
    pub agent_checksum: Option<String>,
    pub worker_checksum: Option<String>,
    pub dependency_checksum: Option<String>,
}

impl ChecksumTriple {
    /// Clear `agent_checksum`, which also invalidates `worker_checksum`
    /// and `dependency_checksum` on the next task (§8).
    pub fn clear_agent(&mut self) {
        self.agent_checksum = None;
        self.worker_checksum = None;
        self.dependency_checksum = None;
    }

    /// §4.3 "Skip": each agent-reported checksum must equal the stored
    /// value.
    pub fn matches(&self, reported: &ChecksumTriple) -> bool {
        self.agent_checksum == reported.agent_checksum
            && self.worker_checksum == reported.worker_checksum
            && self.dependency_checksum == reported.dependency_checksum
    }

    /// Whether all three checksums are present, a precondition for a
    /// `skip` result (§4.3 "Skip").
    pub fn is_complete(&self) -> bool {
        self.agent_checksum.is_some()
            && self.worker_checksum.is_some()
            && self.dependency_checksum.is_some()
    }
}

/// `{(tenant, package_id, target, target_config_name,
/// package_config_name, toolchain_name, toolchain_version), ...}` (§3
/// "Build").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub tenant: String,
    pub package_name: String,
    pub package_version: String,
    pub target: String,
    pub target_config_name: String,
    pub package_config_name: String,
    pub toolchain_name: String,
    pub toolchain_version: String,

    pub state: BuildState,
    pub status: Option<ResultStatus>,
    pub force: ForceState,
    pub timestamp: Timestamp,
    pub soft_timestamp: Timestamp,
    pub hard_timestamp: Timestamp,
    pub completion_timestamp: Option<Timestamp>,
    pub interactive: Option<String>,
    pub agent_fingerprint: Option<String>,
    pub agent_challenge: Option<crate::Challenge>,
    pub machine: String,
    pub auxiliary_machines: Vec<String>,
    pub controller_checksum: String,
    pub machine_checksum: String,
    pub checksums: ChecksumTriple,
    pub results: Vec<OperationResult>,
}

impl Build {
    /// §3 "`status` is present iff the build has ever completed".
    pub fn has_completed(&self) -> bool {
        self.status.is_some()
    }

    /// §3 "interruption is detectable as `timestamp > soft_timestamp`
    /// on a `built` record".
    pub fn was_interrupted(&self) -> bool {
        self.state == BuildState::Built && self.timestamp > self.soft_timestamp
    }

    /// §3 invariant ordering check, used by property tests.
    pub fn timestamp_invariant_holds(&self) -> bool {
        self.soft_timestamp <= self.hard_timestamp && self.hard_timestamp <= self.timestamp
    }

    /// §4.2 "A hard rebuild is forced ... if `hard_timestamp` expired,
    /// if `force=forced`, or if the `controller_checksum` ... or the
    /// `machine_checksum` ... changed."
    pub fn needs_hard_rebuild(
        &self,
        now: Timestamp,
        hard_rebuild_timeout: crate::Duration,
        new_controller_checksum: &str,
        new_machine_checksum: &str,
    ) -> bool {
        self.hard_timestamp.is_older_than(now, hard_rebuild_timeout)
            || self.force == ForceState::Forced
            || self.controller_checksum != new_controller_checksum
            || self.machine_checksum != new_machine_checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_agent_invalidates_whole_triple() {
        let mut c = ChecksumTriple {
            agent_checksum: Some("a".into()),
            worker_checksum: Some("w".into()),
            dependency_checksum: Some("d".into()),
        };
        c.clear_agent();
        assert_eq!(c, ChecksumTriple::default());
    }

    #[test]
    fn matches_compares_all_three_fields() {
        let stored = ChecksumTriple {
            agent_checksum: Some("a".into()),
            worker_checksum: Some("w".into()),
            dependency_checksum: Some("d".into()),
        };
        let mut reported = stored.clone();
        assert!(stored.matches(&reported));
        reported.worker_checksum = Some("other".into());
        assert!(!stored.matches(&reported));
    }

    #[test]
    fn abort_and_abnormal_are_plausible_timeouts() {
        assert!(ResultStatus::Abort.is_plausible_timeout_explanation());
        assert!(ResultStatus::Abnormal.is_plausible_timeout_explanation());
        assert!(!ResultStatus::Success.is_plausible_timeout_explanation());
    }
}
