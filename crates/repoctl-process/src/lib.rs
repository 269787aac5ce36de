//! External subprocess execution for `repoctl`'s handler runners: the
//! fetch tool, the OpenSSL fingerprint translator, the CI handler, and
//! the upload handler (§1 "external-handler process runner", §5
//! "Cancellation and timeouts").
//!
//! # Example
//!
//! ```ignore
//! use repoctl_process::run_command_with_timeout;
//! use std::time::Duration;
//!
//! let out = run_command_with_timeout("fetch-tool", &["cert"], ".".as_ref(), Some(Duration::from_secs(30)))?;
//! assert!(!out.timed_out);
//! ```

use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Result of running a command to completion (no timeout enforced).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl CommandResult {
    pub fn ok(&self) -> Result<&Self> {
        if self.success {
            Ok(self)
        } else {
            Err(anyhow::anyhow!(
                "command failed with exit code {:?}: {}",
                self.exit_code,
                self.stderr
            ))
        }
    }

    pub fn from_output(output: &Output, duration: Duration) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Result of a command execution with timeout bookkeeping. This is the
/// shape every handler runner in `repoctl-loader`/`repoctl-tenant`
/// consumes, since every one of them has an associated
/// `*-handler-timeout` option (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    /// -1 when the process was killed for timing out, or exited
    /// without a code.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// Run a command and capture its output, no timeout.
pub fn run_command(program: &str, args: &[&str]) -> Result<CommandResult> {
    let start = Instant::now();
    let output = Command::new(program)
        .args(args)
        .output()
        .with_context(|| format!("failed to run command: {program} {args:?}"))?;
    Ok(CommandResult::from_output(&output, start.elapsed()))
}

/// Run a command in a specific directory, no timeout.
pub fn run_command_in_dir(program: &str, args: &[&str], dir: &std::path::Path) -> Result<CommandResult> {
    let start = Instant::now();
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("failed to run command: {program} {args:?} in {}", dir.display()))?;
    Ok(CommandResult::from_output(&output, start.elapsed()))
}

/// Run a command with an optional wall-clock timeout and captured
/// output, killing the subprocess on overrun (§5 "on overrun the
/// subprocess is killed and the request fails with 500"). Polls
/// `try_wait` rather than blocking on `wait`, since there is no
/// portable non-blocking `wait_timeout` in the standard library.
pub fn run_command_with_timeout(
    program: &str,
    args: &[&str],
    working_dir: &std::path::Path,
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    let start = Instant::now();

    let Some(timeout_dur) = timeout else {
        let output = run_command_in_dir(program, args, working_dir)?;
        return Ok(CommandOutput {
            exit_code: output.exit_code.unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
            timed_out: false,
            duration: Duration::from_millis(output.duration_ms),
        });
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn command: {program}"))?;

    let deadline = Instant::now() + timeout_dur;
    loop {
        match child
            .try_wait()
            .with_context(|| format!("failed to poll command: {program}"))?
        {
            Some(status) => {
                return Ok(CommandOutput {
                    exit_code: status.code().unwrap_or(-1),
                    stdout: read_pipe(child.stdout.take()),
                    stderr: read_pipe(child.stderr.take()),
                    timed_out: false,
                    duration: start.elapsed(),
                });
            }
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();

                    let mut stderr = read_pipe(child.stderr.take());
                    stderr.push_str(&format!(
                        "\n{program} timed out after {}",
                        humantime::format_duration(timeout_dur)
                    ));

                    return Ok(CommandOutput {
                        exit_code: -1,
                        stdout: read_pipe(child.stdout.take()),
                        stderr,
                        timed_out: true,
                        duration: start.elapsed(),
                    });
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

fn read_pipe<R: Read>(stream: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut s) = stream {
        let _ = s.read_to_end(&mut buffer);
    }
    String::from_utf8_lossy(&buffer).to_string()
}

/// Run a command, feeding `stdin_data` to it and capturing stdout — the
/// shape the OpenSSL bot-key-to-fingerprint translation (§4.1) needs,
/// piping a PEM in and reading a fingerprint line back.
pub fn run_command_with_stdin(program: &str, args: &[&str], stdin_data: &[u8]) -> Result<CommandResult> {
    use std::io::Write;

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn command: {program}"))?;

    child
        .stdin
        .take()
        .expect("stdin was piped")
        .write_all(stdin_data)
        .with_context(|| format!("failed to write stdin to {program}"))?;

    let output = child
        .wait_with_output()
        .with_context(|| format!("failed to wait for command: {program}"))?;
    Ok(CommandResult::from_output(&output, start.elapsed()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_captures_stdout() {
        let result = run_command("echo", &["hello"]).unwrap();
        assert!(result.success);
        assert!(result.stdout.contains("hello"));
    }

    #[test]
    fn run_command_with_timeout_kills_on_overrun() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command_with_timeout(
            "sleep",
            &["10"],
            dir.path(),
            Some(Duration::from_millis(100)),
        )
        .unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
    }

    #[test]
    fn run_command_with_timeout_returns_exit_code_under_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command_with_timeout(
            "true",
            &[],
            dir.path(),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert!(!out.timed_out);
        assert_eq!(out.exit_code, 0);
    }

    #[test]
    fn run_command_with_stdin_pipes_input() {
        let result = run_command_with_stdin("cat", &[], b"hello from stdin").unwrap();
        assert!(result.success);
        assert_eq!(result.stdout, "hello from stdin");
    }
}
