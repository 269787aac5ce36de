//! `RepoError` -> HTTP response (§7 "`RepoError` -> HTTP/exit mapping"):
//! `Client`/`Recoverable`/`Fatal` surface their mapped status with a
//! JSON `{"error": ...}` body; `ExpiredSession`/`AuthFailed` are logged
//! and answered with a plain 200, indistinguishable from success.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use repoctl_error::RepoError;

pub struct ApiError(pub RepoError);

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self.0 {
            RepoError::ExpiredSession(reason) => {
                tracing::warn!(%reason, "expired session");
                StatusCode::OK.into_response()
            }
            RepoError::AuthFailed => {
                tracing::warn!("challenge verification failed");
                StatusCode::OK.into_response()
            }
            other => {
                let status = StatusCode::from_u16(other.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                tracing::error!(%other, %status, "request failed");
                (status, Json(json!({ "error": other.to_string() }))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoctl_error::ClientError;

    #[test]
    fn expired_session_is_a_bare_200() {
        let response = ApiError::from(RepoError::ExpiredSession("gone".into())).into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn auth_failed_is_a_bare_200() {
        let response = ApiError::from(RepoError::AuthFailed).into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn client_error_maps_to_its_client_status() {
        let response = ApiError::from(RepoError::Client(ClientError::PayloadTooLarge(10, 5))).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn recoverable_error_maps_to_500() {
        let response = ApiError::from(RepoError::Recoverable("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
