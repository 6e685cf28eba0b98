// Upstream client implementation
// Thin reqwest wrapper: one outbound call per prepared request, no retries.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Client;
use serde_json::{json, Value};
use tokio::time::Duration;

use crate::proxy::error::ProxyError;
use crate::proxy::services::UpstreamRequest;

/// Status and decoded JSON body of an upstream response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Value,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Upstream failure message, best effort from common error shapes.
    pub fn error_message(&self) -> String {
        self.body
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(|m| m.as_str())
            .or_else(|| self.body.get("message").and_then(|m| m.as_str()))
            .unwrap_or("upstream request failed")
            .to_string()
    }
}

pub struct UpstreamClient {
    http_client: Client,
    requests_sent: AtomicU64,
}

impl UpstreamClient {
    pub fn new() -> Result<Self, ProxyError> {
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("atlas-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            requests_sent: AtomicU64::new(0),
        })
    }

    /// Outbound requests issued over the client's lifetime.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    /// Issue the prepared request and decode the response as JSON. A
    /// non-JSON body (some upstreams answer errors in plain text) is
    /// wrapped so callers always see a JSON value.
    pub async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ProxyError> {
        let mut builder = self
            .http_client
            .request(request.method, &request.url)
            .query(&request.query);

        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| json!({ "message": text }));

        Ok(UpstreamResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_from_openai_shape() {
        let resp = UpstreamResponse {
            status: 401,
            body: json!({ "error": { "message": "Incorrect API key", "type": "auth" } }),
        };
        assert_eq!(resp.error_message(), "Incorrect API key");
    }

    #[test]
    fn error_message_from_flat_shape() {
        let resp = UpstreamResponse {
            status: 404,
            body: json!({ "message": "city not found" }),
        };
        assert_eq!(resp.error_message(), "city not found");
    }

    #[test]
    fn error_message_fallback() {
        let resp = UpstreamResponse {
            status: 502,
            body: json!({}),
        };
        assert_eq!(resp.error_message(), "upstream request failed");
    }
}
