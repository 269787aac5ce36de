//! Repository-walking, dependency-resolving batch loader (§4.1).
//!
//! Mirrors the teacher's publish pipeline shape (fetch → parse →
//! persist, reported through a `Reporter`) generalized from "publish
//! one package" to "reload a tenant's whole repository graph and
//! resolve dependencies across it."

pub mod change_detection;
pub mod fetch;
pub mod manifest_translate;
pub mod reload;
pub mod reporter;
pub mod resolve;

pub use change_detection::{orphaned_repositories, requires_reload};
pub use fetch::{FetchError, fetch_with_retry};
pub use reload::{ReloadError, ReloadOutcome, reload_tenant};
pub use reporter::{ConsoleReporter, RecordingReporter, Reporter};
pub use resolve::{RepositoryGraph, ResolutionError, detect_cycle, resolve_package};

/// Maps a `ReloadError` to the loader's process exit code (§4.1
/// "exit code 2 if an advisory lock cannot be acquired", otherwise 1
/// on any other failure).
pub fn exit_code(lock_acquired: bool, result: &Result<ReloadOutcome, ReloadError>) -> i32 {
    if !lock_acquired {
        return 2;
    }
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_contention_is_exit_code_two() {
        assert_eq!(exit_code(false, &Ok(ReloadOutcome::default())), 2);
    }

    #[test]
    fn success_is_exit_code_zero() {
        assert_eq!(exit_code(true, &Ok(ReloadOutcome::default())), 0);
    }
}
