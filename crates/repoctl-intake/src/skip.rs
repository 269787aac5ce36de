//! Skip handling (§4.3 "Skip"): only valid after soft-rebuild task
//! issuance, and only when every agent-reported checksum matches what
//! was stashed on the build.

use repoctl_types::ChecksumTriple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipError {
    /// §4.3 "Skip ... only valid after soft-rebuild task issuance (all
    /// three checksums present on the build)".
    NotEligible,
    /// §4.3 "each agent-reported checksum must equal the corresponding
    /// stored value, else HTTP 400".
    ChecksumMismatch,
}

/// Validate a `skip` result against the build's stored checksum
/// triple, returning nothing on success (the caller only needs to bump
/// `soft_timestamp`; §4.3 "status is preserved ... results are not
/// updated").
pub fn validate_skip(stored: &ChecksumTriple, reported: &ChecksumTriple) -> Result<(), SkipError> {
    if !stored.is_complete() {
        return Err(SkipError::NotEligible);
    }
    if !stored.matches(reported) {
        return Err(SkipError::ChecksumMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(agent: &str, worker: &str, dep: &str) -> ChecksumTriple {
        ChecksumTriple {
            agent_checksum: Some(agent.into()),
            worker_checksum: Some(worker.into()),
            dependency_checksum: Some(dep.into()),
        }
    }

    #[test]
    fn incomplete_stored_triple_is_not_eligible() {
        let stored = ChecksumTriple::default();
        let reported = complete("a", "w", "d");
        assert_eq!(validate_skip(&stored, &reported), Err(SkipError::NotEligible));
    }

    #[test]
    fn matching_checksums_validate() {
        let stored = complete("a", "w", "d");
        let reported = stored.clone();
        assert!(validate_skip(&stored, &reported).is_ok());
    }

    #[test]
    fn mismatched_checksum_is_rejected() {
        let stored = complete("a", "w", "d");
        let reported = complete("a", "w", "different");
        assert_eq!(
            validate_skip(&stored, &reported),
            Err(SkipError::ChecksumMismatch)
        );
    }
}
