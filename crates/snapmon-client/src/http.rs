//! snapd REST client over reqwest.
//!
//! Requests go over the daemon's Unix socket. When a plain `base_url` is
//! configured the socket is bypassed, which is how the integration tests
//! point the client at a mock server.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use snapmon_core::{Change, DaemonConfig, Notice, Snap};
use tracing::{debug, trace};

use crate::client::{NoticesQuery, SnapdClient, SnapsFilter};
use crate::error::{ClientError, Result};

/// Host used in URLs sent over the socket; snapd ignores it.
const SOCKET_BASE_URL: &str = "http://localhost";

/// Response envelope wrapping every snapd reply.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "status-code", default)]
    status_code: u16,
    #[serde(default)]
    result: serde_json::Value,
}

/// `result` of an error envelope.
#[derive(Debug, Default, Deserialize)]
struct ErrorResult {
    #[serde(default)]
    message: String,
    #[serde(default)]
    kind: Option<String>,
}

/// snapd client using direct HTTP requests.
pub struct HttpSnapdClient {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpSnapdClient {
    /// Create a client from the daemon section of the config.
    pub fn from_config(config: &DaemonConfig) -> Result<Self> {
        let builder = reqwest::Client::builder();
        let (builder, base_url) = match &config.base_url {
            Some(url) => (builder, url.trim_end_matches('/').to_string()),
            None => (
                over_socket(builder, config.socket())?,
                SOCKET_BASE_URL.to_string(),
            ),
        };

        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            base_url = %base_url,
            socket = %config.socket().display(),
            "snapd client created"
        );

        Ok(Self {
            client,
            base_url,
            request_timeout: config.request_timeout(),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        trace!(url = %url, ?query, "daemon request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(e, timeout.as_secs()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::from_transport(e, timeout.as_secs()))?;

        parse_response(status, &body)
    }
}

#[cfg(unix)]
fn over_socket(
    builder: reqwest::ClientBuilder,
    socket_path: &Path,
) -> Result<reqwest::ClientBuilder> {
    Ok(builder.unix_socket(socket_path.to_path_buf()))
}

#[cfg(not(unix))]
fn over_socket(
    _builder: reqwest::ClientBuilder,
    socket_path: &Path,
) -> Result<reqwest::ClientBuilder> {
    Err(ClientError::Config(format!(
        "Unix sockets are not supported on this platform: {}",
        socket_path.display()
    )))
}

/// Unwrap a snapd envelope into its `result`.
fn parse_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            return Err(ClientError::UnexpectedResponse(format!(
                "invalid response envelope: {}",
                e
            )));
        }
        Err(_) => return Err(ClientError::from_http_status(status, body)),
    };

    match envelope.kind.as_str() {
        "sync" => Ok(serde_json::from_value(envelope.result)?),
        "error" => {
            let error: ErrorResult = serde_json::from_value(envelope.result).unwrap_or_default();
            Err(ClientError::Api {
                status: if envelope.status_code == 0 {
                    status
                } else {
                    envelope.status_code
                },
                kind: error.kind,
                message: error.message,
            })
        }
        other => Err(ClientError::UnexpectedResponse(format!(
            "unexpected response type '{}'",
            other
        ))),
    }
}

#[async_trait]
impl SnapdClient for HttpSnapdClient {
    async fn change(&self, id: &str) -> Result<Change> {
        self.get(&format!("/v2/changes/{}", id), &[], self.request_timeout)
            .await
    }

    async fn snap(&self, name: &str) -> Result<Snap> {
        self.get(&format!("/v2/snaps/{}", name), &[], self.request_timeout)
            .await
    }

    async fn snaps(&self, filter: SnapsFilter) -> Result<Vec<Snap>> {
        let query: Vec<(&str, String)> = filter
            .select()
            .map(|select| vec![("select", select.to_string())])
            .unwrap_or_default();
        self.get("/v2/snaps", &query, self.request_timeout).await
    }

    async fn notices(&self, query: &NoticesQuery) -> Result<Vec<Notice>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if !query.types.is_empty() {
            let types: Vec<&str> = query.types.iter().map(|t| t.as_str()).collect();
            params.push(("types", types.join(",")));
        }
        if let Some(after) = query.after {
            params.push(("after", after.to_rfc3339_opts(SecondsFormat::Nanos, true)));
        }

        // The long poll itself must not trip the request timeout.
        let mut timeout = self.request_timeout;
        if let Some(wait) = query.timeout {
            params.push(("timeout", format!("{}ms", wait.as_millis())));
            timeout += wait;
        }

        self.get("/v2/notices", &params, timeout).await
    }

    fn name(&self) -> &str {
        "snapd-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_envelope() {
        let body = r#"{"type":"sync","status-code":200,"status":"OK","result":{"name":"firefox"}}"#;
        let snap: Snap = parse_response(200, body).unwrap();
        assert_eq!(snap.name, "firefox");
    }

    #[test]
    fn test_parse_error_envelope() {
        let body = r#"{"type":"error","status-code":404,"status":"Not Found",
                       "result":{"message":"snap \"nope\" is not installed","kind":"snap-not-found"}}"#;
        let err = parse_response::<Snap>(404, body).unwrap_err();
        match err {
            ClientError::Api {
                status,
                kind,
                message,
            } => {
                assert_eq!(status, 404);
                assert_eq!(kind.as_deref(), Some("snap-not-found"));
                assert!(message.contains("not installed"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_non_envelope_error() {
        let err = parse_response::<Snap>(502, "<html>bad gateway</html>").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_garbage_success() {
        let err = parse_response::<Snap>(200, "not json").unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_parse_async_type_is_unexpected() {
        let body = r#"{"type":"async","status-code":202,"change":"5","result":null}"#;
        let err = parse_response::<Snap>(202, body).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn test_from_config_with_base_url() {
        let config = DaemonConfig {
            base_url: Some("http://127.0.0.1:1/".into()),
            ..DaemonConfig::default()
        };
        let client = HttpSnapdClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:1");
        assert_eq!(client.name(), "snapd-http");
    }
}
