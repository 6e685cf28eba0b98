// OpenAI adapter for the generic proxy: completion-style endpoints with
// cost caps applied before anything is forwarded.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::{json, Value};

use crate::proxy::error::ProxyError;
use crate::proxy::services::{ServiceAdapter, ServiceName, UpstreamRequest};

const BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_MAX_TOKENS: u64 = 1000;
pub const MAX_TOKENS_CAP: u64 = 2000;

// Endpoints the gateway will forward; anything else gets a 404 without an
// upstream call.
const ALLOWED_ENDPOINTS: &[&str] = &["chat/completions", "completions", "embeddings", "moderations"];

pub struct OpenAiAdapter;

impl ServiceAdapter for OpenAiAdapter {
    fn name(&self) -> ServiceName {
        ServiceName::OpenAi
    }

    /// Clamp the cost-sensitive fields: `max_tokens` is defaulted and
    /// capped, `n` is forced to a single choice.
    fn sanitize_body(&self, body: Option<Value>) -> Option<Value> {
        let mut body = body.unwrap_or_else(|| json!({}));

        if let Some(obj) = body.as_object_mut() {
            let max_tokens = obj
                .get("max_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(DEFAULT_MAX_TOKENS)
                .min(MAX_TOKENS_CAP)
                .max(1);
            obj.insert("max_tokens".to_string(), json!(max_tokens));

            if obj.get("n").and_then(|v| v.as_u64()).unwrap_or(1) != 1 {
                obj.insert("n".to_string(), json!(1));
            }

            // Streaming is not supported through the generic proxy.
            obj.remove("stream");
        }

        Some(body)
    }

    fn build_request(
        &self,
        endpoint: &str,
        _method: Method,
        _params: &HashMap<String, String>,
        body: Option<Value>,
        credential: &str,
    ) -> Result<UpstreamRequest, ProxyError> {
        let path = endpoint.trim_matches('/');
        if !ALLOWED_ENDPOINTS.contains(&path) {
            return Err(ProxyError::NotFound(format!(
                "Unknown endpoint: {}",
                endpoint
            )));
        }

        Ok(UpstreamRequest {
            method: Method::POST,
            url: format!("{}/{}", BASE_URL, path),
            query: Vec::new(),
            headers: vec![("authorization", format!("Bearer {}", credential))],
            body: self.sanitize_body(body),
        })
    }

    /// Billing counters stay on the server side.
    fn shape_response(&self, _endpoint: &str, mut raw: Value) -> Value {
        if let Some(obj) = raw.as_object_mut() {
            obj.remove("usage");
            obj.remove("system_fingerprint");
        }
        raw
    }
}
