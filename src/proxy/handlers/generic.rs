// Generic credentialed proxy: GET|POST /proxy?service=&endpoint=
//
// Pipeline per request: resolve adapter -> credential lookup -> body
// sanitization -> build -> single upstream call -> shape. Everything up to
// the upstream call is pure and fails without any network traffic.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::Method,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::Value;
use tracing::debug;

use crate::modules::config::Credentials;
use crate::proxy::error::ProxyError;
use crate::proxy::middleware::rate_limit::ClientKey;
use crate::proxy::rate_limit::{Decision, Quota};
use crate::proxy::server::AppState;
use crate::proxy::services::{self, ServiceName, UpstreamRequest};

/// Completion calls get an additional hourly budget on top of the shared
/// per-minute route quota.
const OPENAI_HOURLY_QUOTA: Quota = Quota::per_hour(100);

/// Resolve and build the outbound request. No I/O happens here; any
/// failure means zero upstream calls were made.
pub(crate) fn prepare(
    service: &str,
    endpoint: &str,
    method: Method,
    params: &HashMap<String, String>,
    body: Option<Value>,
    credentials: &Credentials,
) -> Result<(ServiceName, UpstreamRequest), ProxyError> {
    let adapter = services::resolve(service)?;
    let name = adapter.name();

    let credential = credentials
        .get(name)
        .ok_or_else(|| ProxyError::Misconfigured(name.as_str().to_string()))?;

    let body = adapter.sanitize_body(body);
    let request = adapter.build_request(endpoint, method, params, body, credential)?;

    Ok((name, request))
}

pub async fn handle_proxy(
    State(state): State<AppState>,
    method: Method,
    Query(mut params): Query<HashMap<String, String>>,
    Extension(ClientKey(client)): Extension<ClientKey>,
    body: Option<Json<Value>>,
) -> Result<impl IntoResponse, ProxyError> {
    let service = params
        .remove("service")
        .ok_or_else(|| ProxyError::BadRequest("Missing required parameter: service".to_string()))?;
    let endpoint = params
        .remove("endpoint")
        .ok_or_else(|| ProxyError::BadRequest("Missing required parameter: endpoint".to_string()))?;

    let body = body.map(|Json(v)| v);
    let (name, request) = prepare(&service, &endpoint, method, &params, body, &state.credentials)?;

    if name == ServiceName::OpenAi {
        if let Decision::Rejected { retry_after } =
            state
                .limiter
                .check("proxy:openai", &client, OPENAI_HOURLY_QUOTA)
        {
            return Err(ProxyError::RateLimited { retry_after });
        }
    }

    debug!("proxying {} -> {}", name, endpoint);

    let response = state.upstream.send(request).await?;
    if !response.is_success() {
        return Err(ProxyError::Upstream {
            status: response.status,
            message: response.error_message(),
        });
    }

    let adapter = services::adapter_for(name);
    Ok(Json(adapter.shape_response(&endpoint, response.body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn credentials_with_all() -> Credentials {
        let mut map = HashMap::new();
        for name in ServiceName::ALL {
            map.insert(name, format!("{}-secret", name));
        }
        Credentials::from_map(map)
    }

    #[test]
    fn unknown_service_fails_before_any_request_is_built() {
        let err = prepare(
            "unknown",
            "whatever",
            Method::GET,
            &HashMap::new(),
            None,
            &credentials_with_all(),
        )
        .unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Unsupported service: unknown");
    }

    #[test]
    fn missing_credential_is_a_server_error() {
        let credentials = Credentials::from_map(HashMap::new());
        let err = prepare(
            "openai",
            "chat/completions",
            Method::POST,
            &HashMap::new(),
            Some(json!({ "model": "gpt-4o-mini" })),
            &credentials,
        )
        .unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn openai_body_is_sanitized_on_the_way_through() {
        let (_, request) = prepare(
            "openai",
            "chat/completions",
            Method::POST,
            &HashMap::new(),
            Some(json!({ "model": "gpt-4o-mini", "messages": [] })),
            &credentials_with_all(),
        )
        .unwrap();

        assert_eq!(request.body.as_ref().unwrap()["max_tokens"], 1000);
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| *k == "authorization" && v == "Bearer openai-secret"));
    }

    #[test]
    fn maps_request_carries_injected_key() {
        let mut params = HashMap::new();
        params.insert("query".to_string(), "coffee".to_string());

        let (name, request) = prepare(
            "google_maps",
            "place/textsearch",
            Method::GET,
            &params,
            None,
            &credentials_with_all(),
        )
        .unwrap();

        assert_eq!(name, ServiceName::GoogleMaps);
        assert!(request
            .query
            .iter()
            .any(|(k, v)| k == "key" && v == "google_maps-secret"));
    }
}
