//! Typed error kinds for `repoctl` (§7 "Error Handling Design").
//!
//! The five kinds here are boundary types: internal plumbing keeps
//! using `anyhow::{Context, Result}` the way the rest of this
//! workspace's ancestry does, and only converts into a `RepoError` at
//! the seams §7 names — the outermost request handler, the loader's
//! `main`, and the scheduler/intake transaction boundary.

use std::fmt;

/// One of the five error kinds from §7, independent of the underlying
/// cause.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// HTTP 4xx: malformed manifest, missing required field, payload
    /// too large, invalid session format, invalid parameter,
    /// unsupported review result, overrides parse failure.
    #[error("client error: {0}")]
    Client(#[source] ClientError),

    /// HTTP 5xx after exhaustion: serializable-transaction conflict,
    /// transient database disconnection. Recoverable errors are
    /// retried by `repoctl-retry` before ever reaching this variant;
    /// seeing one here means retries were exhausted.
    #[error("recoverable error (retries exhausted): {0}")]
    Recoverable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Process exit / HTTP 500: unable to fork a subprocess, schema
    /// mismatch, configuration violation.
    #[error("fatal error: {0}")]
    Fatal(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Logged warning, HTTP 200: the session refers to an entity that
    /// no longer exists or whose timestamp has moved.
    #[error("expired session: {0}")]
    ExpiredSession(String),

    /// Logged warning, HTTP 200: challenge verification failed.
    /// Deliberately indistinguishable from success to an outside
    /// observer — callers must not let this variant's presence leak
    /// into the HTTP response body or status.
    #[error("authentication failed")]
    AuthFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),
    /// §4.2 "If an agent-keys directory is configured, the fingerprint
    /// is required; absence → HTTP 401."
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("payload too large: {0} bytes (limit {1})")]
    PayloadTooLarge(usize, usize),
    #[error("invalid session format: {0}")]
    InvalidSession(String),
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("unsupported review result: {0}")]
    UnsupportedReviewResult(String),
    #[error("failed to parse overrides: {0}")]
    OverridesParseFailure(String),
}

/// A recoverable-vs-fatal classification a retry loop (`repoctl-retry`)
/// consults before deciding whether to retry a failed attempt (§5
/// "Database concurrency", §7 "Propagation policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Client,
    Recoverable,
    Fatal,
}

/// Kept separate from `RepoError` itself (which owns a boxed
/// `dyn Error`) so retry classifiers can pattern-match on a plain
/// database-layer error before it is wrapped.
pub trait Classify {
    fn classify(&self) -> ErrorClass;
}

impl RepoError {
    /// §7 mapping table: the HTTP status this error kind surfaces as.
    /// `ExpiredSession` and `AuthFailed` both map to 200 by design —
    /// the caller logs a warning and returns success to the agent.
    pub fn http_status(&self) -> u16 {
        match self {
            RepoError::Client(e) => e.http_status(),
            RepoError::Recoverable(_) => 500,
            RepoError::Fatal(_) => 500,
            RepoError::ExpiredSession(_) => 200,
            RepoError::AuthFailed => 200,
        }
    }

    /// §6 "Exit codes" mapping for batch callers (the loader, the CI
    /// CLI): 1 general error, 3 recoverable-database error. Advisory
    /// lock contention (exit 2) is not representable here since it is
    /// not a `RepoError` variant — see `repoctl_loader::LockError`.
    pub fn exit_code(&self) -> i32 {
        match self {
            RepoError::Client(_) | RepoError::Fatal(_) => 1,
            RepoError::Recoverable(_) => 3,
            RepoError::ExpiredSession(_) | RepoError::AuthFailed => 0,
        }
    }

    /// Whether this error should ever be retried. Matches §7
    /// "Propagation policy": only `Recoverable` retries, and only
    /// before it reaches this boxed/exhausted form.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepoError::Recoverable(_))
    }
}

impl ClientError {
    pub fn http_status(&self) -> u16 {
        match self {
            ClientError::PayloadTooLarge(..) => 413,
            ClientError::Unauthorized(_) => 401,
            ClientError::InvalidParameter { .. }
            | ClientError::UnsupportedReviewResult(_)
            | ClientError::OverridesParseFailure(_) => 422,
            ClientError::MalformedManifest(_)
            | ClientError::MissingField(_)
            | ClientError::InvalidSession(_) => 400,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Client => "client",
            ErrorClass::Recoverable => "recoverable",
            ErrorClass::Fatal => "fatal",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_session_and_auth_failed_map_to_200() {
        assert_eq!(RepoError::ExpiredSession("gone".into()).http_status(), 200);
        assert_eq!(RepoError::AuthFailed.http_status(), 200);
    }

    #[test]
    fn client_payload_too_large_maps_to_413() {
        let e = ClientError::PayloadTooLarge(10, 5);
        assert_eq!(e.http_status(), 413);
    }

    #[test]
    fn client_unauthorized_maps_to_401() {
        let e = ClientError::Unauthorized("missing fingerprint".into());
        assert_eq!(e.http_status(), 401);
    }

    #[test]
    fn only_recoverable_is_retryable() {
        assert!(RepoError::Recoverable(Box::new(std::io::Error::other("x"))).is_retryable());
        assert!(!RepoError::AuthFailed.is_retryable());
        assert!(!RepoError::Fatal(Box::new(std::io::Error::other("x"))).is_retryable());
    }

    #[test]
    fn exit_codes_match_spec_table() {
        assert_eq!(
            RepoError::Client(ClientError::MissingField("x".into())).exit_code(),
            1
        );
        assert_eq!(
            RepoError::Recoverable(Box::new(std::io::Error::other("x"))).exit_code(),
            3
        );
    }
}
