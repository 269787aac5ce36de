//! Tenant-service notification delivery (§4.2 "Tenant-service
//! notifications", §4.3 "Notifications").
//!
//! Unlike the teacher's fire-and-forget `WebhookClient` (a
//! `std::thread::spawn` dispatch whose result is only ever logged), a
//! `service_build_queued`/`service_build_building`/`service_build_built`
//! callback is consulted synchronously and may hand back replacement
//! service data that the caller must persist. The HTTP transport,
//! HMAC-SHA256 signing, and error shape are carried over from the
//! teacher's `shipper-webhook`.

use anyhow::{Context, Result, bail};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use repoctl_types::{BuildState, Timestamp};

type HmacSha256 = Hmac<Sha256>;

/// Registered tenant-service endpoint. Absence of a config for a given
/// `service_type` means the corresponding callback is not registered
/// and the notification step is skipped entirely (§4.2: "if a
/// `service_build_queued` callback is registered").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpointConfig {
    pub url: String,
    pub secret: Option<String>,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: std::time::Duration,
}

fn default_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(30)
}

/// One build's identity as reported to a tenant service, kept minimal
/// on purpose — the wire shape in §4.2/§4.3 lists package, version,
/// target and configuration coordinates plus the transition kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifiedBuild {
    pub package_name: String,
    pub package_version: String,
    pub target: String,
    pub target_config: String,
    pub package_config: String,
}

/// The three lifecycle notifications a tenant service can subscribe to
/// (§4.2/§4.3). Exactly one of `Built`/`Queued` fires per result
/// (§4.3: "mutually exclusive by construction").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCallback {
    Queued,
    Building,
    Built,
}

#[derive(Debug, Serialize)]
struct NotificationPayload<'a> {
    callback: ServiceCallback,
    tenant: &'a str,
    timestamp: i64,
    builds: &'a [NotifiedBuild],
    /// Present only for the `built` callback, where §4.3 reports the
    /// final state reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<BuildState>,
    /// Opaque service-owned payload previously stashed on the tenant,
    /// round-tripped so the service can correlate requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    service_data: Option<serde_json::Value>,
}

/// What the tenant service returned: possibly-updated service data to
/// be persisted on the tenant record (§4.2: "if the callback returns
/// new service data, update it").
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationResponse {
    #[serde(default)]
    pub service_data: Option<serde_json::Value>,
}

/// Synchronous client for a single tenant-service endpoint. One client
/// is built per registered `service_type`/URL; callers invoke it
/// in-line during the scheduler/intake transaction, not from a spawned
/// thread, because the result is needed before the transaction
/// commits.
pub struct ServiceClient {
    client: reqwest::blocking::Client,
    url: String,
    secret: Option<String>,
}

impl ServiceClient {
    pub fn new(config: &ServiceEndpointConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build tenant-service HTTP client")?;
        Ok(Self {
            client,
            url: config.url.clone(),
            secret: config.secret.clone(),
        })
    }

    /// Invoke the callback and return any replacement service data.
    /// Transport or non-2xx failures are surfaced to the caller (who is
    /// expected to classify them via `repoctl_error::RepoError` and
    /// retry through `repoctl_retry`), unlike the teacher's
    /// `maybe_send_event`, which swallows every error.
    pub fn notify(
        &self,
        callback: ServiceCallback,
        tenant: &str,
        now: Timestamp,
        builds: &[NotifiedBuild],
        state: Option<BuildState>,
        service_data: Option<serde_json::Value>,
    ) -> Result<NotificationResponse> {
        let payload = NotificationPayload {
            callback,
            tenant,
            timestamp: now.as_nanos(),
            builds,
            state,
            service_data,
        };
        let json = serde_json::to_string(&payload).context("failed to serialize notification payload")?;

        let mut request = self.client.post(&self.url).header("Content-Type", "application/json");
        if let Some(secret) = &self.secret {
            let signature = sign(secret, json.as_bytes());
            request = request.header("X-Repoctl-Signature", format!("sha256={signature}"));
        }

        let response = request
            .body(json)
            .send()
            .context("failed to deliver tenant-service notification")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("tenant service returned error status {status}: {body}");
        }

        if response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "0")
            .unwrap_or(false)
        {
            return Ok(NotificationResponse { service_data: None });
        }

        let text = response.text().unwrap_or_default();
        if text.trim().is_empty() {
            return Ok(NotificationResponse { service_data: None });
        }
        serde_json::from_str(&text).context("failed to parse tenant-service response")
    }
}

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify an inbound `X-Repoctl-Signature: sha256=<hex>` header — used
/// if a tenant service is itself configured to countersign the
/// acknowledgement, kept symmetric with `sign` for testability.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(hex_sig) = header_value.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&sig_bytes).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn spawn_server(
        response_body: &'static str,
    ) -> (String, std::thread::JoinHandle<Option<String>>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind");
        let addr = server.server_addr().to_string();
        let handle = std::thread::spawn(move || {
            let request = server.recv().ok()?;
            let sig = request
                .headers()
                .iter()
                .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("X-Repoctl-Signature"))
                .map(|h| h.value.as_str().to_string());
            let mut request = request;
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let response = tiny_http::Response::from_string(response_body);
            let _ = request.respond(response);
            sig.or(Some(body))
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn notify_returns_updated_service_data() {
        let (url, handle) = spawn_server(r#"{"service_data":{"id":"svc-1"}}"#);
        let client = ServiceClient::new(&ServiceEndpointConfig {
            url,
            secret: None,
            timeout: default_timeout(),
        })
        .unwrap();

        let resp = client
            .notify(
                ServiceCallback::Queued,
                "libfoo",
                Timestamp::from_nanos(1),
                &[NotifiedBuild {
                    package_name: "libfoo".into(),
                    package_version: "1.0.0".into(),
                    target: "x86_64-linux-gnu".into(),
                    target_config: "linux-gcc".into(),
                    package_config: "default".into(),
                }],
                None,
                None,
            )
            .unwrap();

        assert_eq!(resp.service_data, Some(serde_json::json!({"id": "svc-1"})));
        handle.join().unwrap();
    }

    #[test]
    fn notify_empty_body_yields_no_service_data() {
        let (url, handle) = spawn_server("");
        let client = ServiceClient::new(&ServiceEndpointConfig {
            url,
            secret: None,
            timeout: default_timeout(),
        })
        .unwrap();

        let resp = client
            .notify(ServiceCallback::Built, "libfoo", Timestamp::from_nanos(1), &[], Some(BuildState::Built), None)
            .unwrap();
        assert!(resp.service_data.is_none());
        handle.join().unwrap();
    }

    #[test]
    fn notify_signs_payload_when_secret_configured() {
        let (url, handle) = spawn_server("{}");
        let client = ServiceClient::new(&ServiceEndpointConfig {
            url,
            secret: Some("hook-secret".into()),
            timeout: default_timeout(),
        })
        .unwrap();

        client
            .notify(ServiceCallback::Building, "libfoo", Timestamp::from_nanos(1), &[], None, None)
            .unwrap();

        let captured = handle.join().unwrap();
        let sig = captured.expect("signature header captured");
        assert!(sig.starts_with("sha256="));
        assert_eq!(sig.len(), "sha256=".len() + 64);
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let body = b"hello world";
        let sig = sign("s3cret", body);
        let header = format!("sha256={sig}");
        assert!(verify_signature("s3cret", body, &header));
        assert!(!verify_signature("wrong", body, &header));
    }

    #[test]
    fn verify_signature_rejects_malformed_header() {
        assert!(!verify_signature("s3cret", b"x", "not-a-signature"));
        assert!(!verify_signature("s3cret", b"x", "sha256=zz"));
    }

    #[test]
    fn client_requires_reachable_url_on_send() {
        let client = ServiceClient::new(&ServiceEndpointConfig {
            url: "http://127.0.0.1:1".into(),
            secret: None,
            timeout: std::time::Duration::from_millis(200),
        })
        .unwrap();
        let result = client.notify(ServiceCallback::Queued, "t", Timestamp::from_nanos(0), &[], None, None);
        assert!(result.is_err());
    }
}
