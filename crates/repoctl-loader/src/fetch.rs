//! Fetch-tool invocation with the loader's specific retry rule (§4.1
//! Pass 1: "running the fetch-tool in a retry loop (up to N attempts
//! with 1-second back-off on exit code 2)").

use repoctl_process::{CommandOutput, run_command_with_timeout};
use repoctl_retry::{Outcome, RetryExecutor, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch tool exited with code {0}: {1}")]
    NonZeroExit(i32, String),
    #[error("failed to invoke fetch tool: {0}")]
    Io(String),
}

/// Exit code 2 from the fetch tool means "transient, retry"; anything
/// else is fatal immediately.
pub fn fetch_with_retry(
    fetch_tool: &str,
    args: &[&str],
    working_dir: &std::path::Path,
    max_attempts: u32,
) -> Result<CommandOutput, FetchError> {
    let mut policy = RetryPolicy::FetchTool.to_config();
    policy.max_attempts = max_attempts;
    let executor = RetryExecutor::new(policy);

    executor.run_classified(|_attempt| {
        let output = run_command_with_timeout(fetch_tool, args, working_dir, None)
            .map_err(|e| (FetchError::Io(e.to_string()), Outcome::Stop))?;

        if output.success() {
            Ok(output)
        } else if output.exit_code == 2 {
            Err((FetchError::NonZeroExit(2, output.stderr.clone()), Outcome::Retry))
        } else {
            Err((
                FetchError::NonZeroExit(output.exit_code, output.stderr.clone()),
                Outcome::Stop,
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_on_first_try_with_exit_zero() {
        let dir = tempfile::tempdir().unwrap();
        let result = fetch_with_retry("true", &[], dir.path(), 3);
        assert!(result.is_ok());
    }

    #[test]
    fn non_retryable_exit_code_stops_immediately() {
        let dir = tempfile::tempdir().unwrap();
        // `false` exits 1, which is not the retryable code 2.
        let result = fetch_with_retry("false", &[], dir.path(), 5);
        assert!(matches!(result, Err(FetchError::NonZeroExit(1, _))));
    }
}
