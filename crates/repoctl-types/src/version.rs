use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A package version as the 4-tuple the data model orders and compares
/// by: `(epoch, canonical_upstream, canonical_release, revision)` (§3,
/// §8 "Version ordering").
///
/// `upstream` and `release` keep both their original and canonicalized
/// form: the original is what gets displayed back to users (and
/// persisted for `upstream_version?`), the canonical form is what
/// ordering and equality use. An absent revision and a zero revision
/// compare equal in the identity tuple, but `revision` itself stays an
/// `Option<u32>` so round-tripping preserves whether it was present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub epoch: u32,
    pub upstream: String,
    pub canonical_upstream: String,
    pub release: Option<String>,
    pub canonical_release: Option<String>,
    pub revision: Option<u32>,
}

impl Version {
    pub fn new(epoch: u32, upstream: impl Into<String>, release: Option<String>) -> Self {
        let upstream = upstream.into();
        let canonical_upstream = canonicalize_component(&upstream);
        let canonical_release = release.as_deref().map(canonicalize_component);
        Version {
            epoch,
            upstream,
            canonical_upstream,
            release,
            canonical_release,
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = Some(revision);
        self
    }

    /// The revision used for identity/ordering purposes: an absent
    /// revision is identical to a zero revision (§3 Package invariant).
    fn revision_key(&self) -> u32 {
        self.revision.unwrap_or(0)
    }

    /// The `(epoch, canonical_upstream, canonical_release, revision)`
    /// identity tuple that two versions compare equal/ordered by.
    fn identity_key(&self) -> (u32, &str, Option<&str>, u32) {
        (
            self.epoch,
            self.canonical_upstream.as_str(),
            self.canonical_release.as_deref(),
            self.revision_key(),
        )
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}+", self.epoch)?;
        }
        write!(f, "{}", self.upstream)?;
        if let Some(release) = &self.release {
            write!(f, "-{release}")?;
        }
        if let Some(revision) = self.revision {
            write!(f, "+{revision}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.identity_key() == other.identity_key()
    }
}
impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity_key().cmp(&other.identity_key())
    }
}

/// Lower-cases and collapses separator runs (`.`, `_`, `-`) the way the
/// original's canonical-version algorithm does, so that e.g. `1.2_2`
/// and `1.2.2` are treated as the same upstream component for ordering.
fn canonicalize_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_sep = false;
    for c in s.chars() {
        if c == '.' || c == '_' || c == '-' {
            if !last_was_sep && !out.is_empty() {
                out.push('.');
            }
            last_was_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        }
    }
    out
}

/// A version-constraint expression attached to a dependency: `== V`,
/// `>= V`, `> V`, `<= V`, `< V`, or a closed range, matching what
/// `repoctl-loader`'s dependency resolver (§4.1) evaluates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VersionConstraint {
    Exact(Version),
    AtLeast(Version),
    GreaterThan(Version),
    AtMost(Version),
    LessThan(Version),
    Range { lower: Version, upper: Version },
}

impl VersionConstraint {
    pub fn satisfied_by(&self, v: &Version) -> bool {
        match self {
            VersionConstraint::Exact(c) => v == c,
            VersionConstraint::AtLeast(c) => v >= c,
            VersionConstraint::GreaterThan(c) => v > c,
            VersionConstraint::AtMost(c) => v <= c,
            VersionConstraint::LessThan(c) => v < c,
            VersionConstraint::Range { lower, upper } => v >= lower && v <= upper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_zero_revision_compare_equal() {
        let a = Version::new(0, "1.2.2", None);
        let b = Version::new(0, "1.2.2", None).with_revision(0);
        assert_eq!(a, b);
    }

    #[test]
    fn separator_variants_canonicalize_equal() {
        let a = Version::new(0, "1.2_2", None);
        let b = Version::new(0, "1.2.2", None);
        assert_eq!(a, b);
    }

    #[test]
    fn epoch_dominates_ordering() {
        let a = Version::new(0, "9.0.0", None);
        let b = Version::new(1, "0.0.1", None);
        assert!(b > a);
    }

    #[test]
    fn constraint_at_least_is_inclusive() {
        let c = VersionConstraint::AtLeast(Version::new(0, "2.4.0", None));
        assert!(c.satisfied_by(&Version::new(0, "2.4.0", None)));
        assert!(c.satisfied_by(&Version::new(0, "2.4.1", None)));
        assert!(!c.satisfied_by(&Version::new(0, "2.3.9", None)));
    }

    proptest::proptest! {
        #[test]
        fn ordering_is_total(a_up in "[0-9]{1,3}\\.[0-9]{1,3}", b_up in "[0-9]{1,3}\\.[0-9]{1,3}") {
            let a = Version::new(0, a_up, None);
            let b = Version::new(0, b_up, None);
            let lt = a < b;
            let gt = a > b;
            let eq = a == b;
            prop_assert_eq!([lt, gt, eq].iter().filter(|x| **x).count(), 1);
        }
    }
}
