use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// `{(tenant, canonical_name), location, display_name, priority,
/// internal, buildable, cache_location, certificate?,
/// packages_timestamp, repositories_timestamp, complements[],
/// prerequisites[]}` (§3 "Repository").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub tenant: String,
    pub canonical_name: String,
    pub location: String,
    pub display_name: String,
    pub priority: u16,
    pub internal: bool,
    pub buildable: bool,
    pub cache_location: Option<String>,
    pub certificate: Option<Certificate>,
    pub packages_timestamp: Timestamp,
    pub repositories_timestamp: Timestamp,
    pub complements: Vec<String>,
    pub prerequisites: Vec<String>,
}

impl Repository {
    /// Validates the two invariants from §3: `priority > 0` iff
    /// `internal`, and `buildable` implies `internal`.
    pub fn validate(&self) -> Result<(), RepositoryInvariantViolation> {
        if (self.priority > 0) != self.internal {
            return Err(RepositoryInvariantViolation::PriorityRequiresInternal);
        }
        if self.buildable && !self.internal {
            return Err(RepositoryInvariantViolation::BuildableRequiresInternal);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryInvariantViolation {
    #[error("priority must be nonzero iff the repository is internal")]
    PriorityRequiresInternal,
    #[error("buildable repositories must be internal")]
    BuildableRequiresInternal,
}

/// A signing certificate associated with a repository, computed from
/// the fetch tool output (§4.1 Pass 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub fingerprint: String,
    pub pem: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(tenant: &str) -> Repository {
        Repository {
            tenant: tenant.to_string(),
            canonical_name: "stable".into(),
            location: "https://example.com/stable".into(),
            display_name: "Stable".into(),
            priority: 1,
            internal: true,
            buildable: true,
            cache_location: Some("/cache/stable".into()),
            certificate: None,
            packages_timestamp: Timestamp::now(),
            repositories_timestamp: Timestamp::now(),
            complements: vec![],
            prerequisites: vec![],
        }
    }

    #[test]
    fn internal_with_priority_is_valid() {
        assert!(base("").validate().is_ok());
    }

    #[test]
    fn external_with_priority_is_invalid() {
        let mut r = base("");
        r.internal = false;
        r.buildable = false;
        assert_eq!(
            r.validate(),
            Err(RepositoryInvariantViolation::PriorityRequiresInternal)
        );
    }

    #[test]
    fn buildable_external_is_invalid() {
        let mut r = base("");
        r.internal = false;
        r.priority = 0;
        assert_eq!(
            r.validate(),
            Err(RepositoryInvariantViolation::BuildableRequiresInternal)
        );
    }
}
