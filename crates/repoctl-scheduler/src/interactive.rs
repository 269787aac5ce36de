//! Interactive-tenant validation (§4.2 "Interactive validation"): an
//! interactive build may resolve to at most one target configuration
//! across the offered build machines. Resolving to more than one aborts
//! every candidate build with a synthetic `configure` operation result
//! and archives the tenant.

use repoctl_types::{OperationResult, ResultStatus};

pub const MULTIPLE_CONFIGURATIONS_MESSAGE: &str = "multiple configurations for interactive build";

/// The synthetic result recorded on an aborted interactive build (§4.2).
pub fn synthetic_abort_result() -> OperationResult {
    OperationResult {
        operation: "configure".to_string(),
        status: ResultStatus::Abort,
        log: MULTIPLE_CONFIGURATIONS_MESSAGE.to_string(),
    }
}

/// Whether the offered build machines resolve to more than one
/// distinct target configuration — the condition that aborts an
/// interactive build.
pub fn has_multiple_configurations(resolved_config_names: &[&str]) -> bool {
    let mut distinct: Vec<&str> = resolved_config_names.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    distinct.len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_configuration_passes() {
        assert!(!has_multiple_configurations(&["linux-gcc", "linux-gcc"]));
    }

    #[test]
    fn no_configuration_passes() {
        assert!(!has_multiple_configurations(&[]));
    }

    #[test]
    fn two_distinct_configurations_trip_the_check() {
        assert!(has_multiple_configurations(&["linux-gcc", "linux-clang"]));
    }

    #[test]
    fn synthetic_abort_result_names_the_configure_operation() {
        let result = synthetic_abort_result();
        assert_eq!(result.operation, "configure");
        assert_eq!(result.status, ResultStatus::Abort);
        assert_eq!(result.log, MULTIPLE_CONFIGURATIONS_MESSAGE);
    }
}
