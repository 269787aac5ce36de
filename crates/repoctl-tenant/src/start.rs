//! The shared CI "start" routine (§4.4 "Load ... delegate to the
//! shared start routine which serializes a CI request manifest, runs
//! the optional CI handler, persists a result manifest alongside, and
//! emails the request/overrides/result manifests"). Both `create` (for
//! a fresh submission) and `load` (for an existing unloaded tenant)
//! call this with a `CiSubmission` that differs only in
//! `service_action`.

use repoctl_config::CiConfig;
use repoctl_types::protocol::{CiResult, CiResultStatus, CiSubmission};

use crate::email::{CiEmailSink, CiNotification};

pub struct StartOutcome {
    pub result: CiResult,
}

/// Writes `request.manifest`/`result.manifest` under
/// `ci.data_dir/<submission.id>/`, invokes `ci.handler` if configured
/// (treating its absence as automatic success, mirroring the loader's
/// optional fetch/upload handlers), and forwards both manifests to the
/// email sink.
pub fn run_start(
    config: &CiConfig,
    submission: &CiSubmission,
    overrides_manifest: Option<&str>,
    email_sink: &dyn CiEmailSink,
) -> anyhow::Result<StartOutcome> {
    let dir = config.data_dir.join(&submission.id);
    std::fs::create_dir_all(&dir)?;

    let request_manifest = serde_json::to_string_pretty(submission)?;
    std::fs::write(dir.join("request.manifest"), &request_manifest)?;

    let result = match &config.handler {
        Some(handler) => {
            let handler_str = handler.to_string_lossy().into_owned();
            let dir_arg = dir.to_string_lossy().into_owned();
            let output = repoctl_process::run_command_with_timeout(
                &handler_str,
                &[dir_arg.as_str()],
                &dir,
                Some(config.handler_timeout),
            )?;
            if output.success() {
                CiResult {
                    status: CiResultStatus::Success,
                    message: output.stdout.trim().to_string(),
                    reference: None,
                }
            } else if output.timed_out {
                CiResult {
                    status: CiResultStatus::Failure,
                    message: "CI handler timed out".to_string(),
                    reference: None,
                }
            } else {
                CiResult {
                    status: CiResultStatus::Failure,
                    message: output.stderr.trim().to_string(),
                    reference: None,
                }
            }
        }
        None => CiResult {
            status: CiResultStatus::Success,
            message: "submission accepted".to_string(),
            reference: None,
        },
    };

    let result_manifest = serde_json::to_string_pretty(&result)?;
    std::fs::write(dir.join("result.manifest"), &result_manifest)?;

    if let Err(e) = email_sink.enqueue(CiNotification {
        request_manifest,
        overrides_manifest: overrides_manifest.map(str::to_string),
        result_manifest,
    }) {
        tracing::warn!(error = %e, submission = %submission.id, "CI submission email enqueue failed");
    }

    Ok(StartOutcome { result })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::RecordingCiEmailSink;
    use repoctl_types::protocol::ServiceAction;

    fn submission(id: &str) -> CiSubmission {
        CiSubmission {
            id: id.into(),
            repository: "https://example.test/repo".into(),
            package: vec![],
            timestamp: "2026-01-01T00:00:00Z".into(),
            client_ip: None,
            user_agent: None,
            interactive: None,
            simulate: None,
            service_id: Some("svc-1".into()),
            service_type: Some("github".into()),
            service_data: None,
            service_action: Some(ServiceAction::Start),
            custom: vec![],
        }
    }

    #[test]
    fn no_handler_configured_is_automatic_success() {
        let dir = tempfile::tempdir().unwrap();
        let config = CiConfig {
            data_dir: dir.path().to_path_buf(),
            handler: None,
            handler_timeout: std::time::Duration::from_secs(5),
            duplicate_tenant_mode: repoctl_types::DuplicateTenantMode::Fail,
        };
        let sink = RecordingCiEmailSink::new();
        let outcome = run_start(&config, &submission("req-1"), None, &sink).unwrap();
        assert_eq!(outcome.result.status, CiResultStatus::Success);
        assert_eq!(sink.sent().len(), 1);
        assert!(dir.path().join("req-1/request.manifest").exists());
        assert!(dir.path().join("req-1/result.manifest").exists());
    }
}
