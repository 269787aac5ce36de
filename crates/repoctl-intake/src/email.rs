//! Email delivery as an injected collaborator (§1 "HTML/email
//! rendering is out of scope"; §4.3 implementation notes). Keeps the
//! decision logic — who gets emailed, and whether this is a
//! de-dup'd repeat — testable in this crate without a real sendmail
//! channel.

use repoctl_error::RepoError;
use repoctl_types::{EmailKind, ResultStatus};

/// What would have been rendered and handed to sendmail for one
/// terminal build result.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    pub to: Vec<String>,
    pub template: EmailKind,
    pub context: NotificationContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContext {
    pub package_name: String,
    pub package_version: String,
    pub target: String,
    pub status: ResultStatus,
}

pub trait EmailSink: Send + Sync {
    fn enqueue(&self, request: NotificationRequest) -> Result<(), RepoError>;
}

/// Default sink: drops every notification. Used when no outbound mail
/// transport is configured.
#[derive(Debug, Default)]
pub struct NullEmailSink;

impl EmailSink for NullEmailSink {
    fn enqueue(&self, _request: NotificationRequest) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Test sink: records every notification it receives instead of
/// sending anything.
#[derive(Debug, Default)]
pub struct RecordingEmailSink {
    sent: std::sync::Mutex<Vec<NotificationRequest>>,
}

impl RecordingEmailSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().expect("recording sink mutex poisoned").clone()
    }
}

impl EmailSink for RecordingEmailSink {
    fn enqueue(&self, request: NotificationRequest) -> Result<(), RepoError> {
        self.sent.lock().expect("recording sink mutex poisoned").push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NotificationRequest {
        NotificationRequest {
            to: vec!["build@x".into()],
            template: EmailKind::Build,
            context: NotificationContext {
                package_name: "libx".into(),
                package_version: "1.0".into(),
                target: "x86_64-linux-gnu".into(),
                status: ResultStatus::Success,
            },
        }
    }

    #[test]
    fn null_sink_accepts_and_drops() {
        let sink = NullEmailSink;
        assert!(sink.enqueue(sample()).is_ok());
    }

    #[test]
    fn recording_sink_retains_every_request() {
        let sink = RecordingEmailSink::new();
        sink.enqueue(sample()).unwrap();
        sink.enqueue(sample()).unwrap();
        assert_eq!(sink.sent().len(), 2);
    }
}
