//! CI-submission email delivery (§4.4 "emails the
//! request/overrides/result manifests"), injected the same way
//! `repoctl-intake` injects its build-result notification sink —
//! keeps the out-of-scope sendmail channel external while the manifest
//! assembly stays in this crate and testable.

use repoctl_error::RepoError;

#[derive(Debug, Clone, PartialEq)]
pub struct CiNotification {
    pub request_manifest: String,
    pub overrides_manifest: Option<String>,
    pub result_manifest: String,
}

pub trait CiEmailSink: Send + Sync {
    fn enqueue(&self, notification: CiNotification) -> Result<(), RepoError>;
}

#[derive(Debug, Default)]
pub struct NullCiEmailSink;

impl CiEmailSink for NullCiEmailSink {
    fn enqueue(&self, _notification: CiNotification) -> Result<(), RepoError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingCiEmailSink {
    sent: std::sync::Mutex<Vec<CiNotification>>,
}

impl RecordingCiEmailSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<CiNotification> {
        self.sent.lock().expect("recording sink mutex poisoned").clone()
    }
}

impl CiEmailSink for RecordingCiEmailSink {
    fn enqueue(&self, notification: CiNotification) -> Result<(), RepoError> {
        self.sent.lock().expect("recording sink mutex poisoned").push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CiNotification {
        CiNotification {
            request_manifest: "request".into(),
            overrides_manifest: None,
            result_manifest: "result".into(),
        }
    }

    #[test]
    fn null_sink_drops_everything() {
        assert!(NullCiEmailSink.enqueue(sample()).is_ok());
    }

    #[test]
    fn recording_sink_retains_every_notification() {
        let sink = RecordingCiEmailSink::new();
        sink.enqueue(sample()).unwrap();
        assert_eq!(sink.sent().len(), 1);
    }
}
