// Service registry - one adapter per proxied upstream.
//
// Each adapter owns the three per-service concerns: sanitizing the inbound
// body, building the outbound request (credential injection in the
// upstream's native convention), and shaping the upstream response down to
// the fields the client needs.

pub mod google_maps;
pub mod openai;
pub mod unsplash;
pub mod weather;

use std::collections::HashMap;
use std::fmt;

use reqwest::Method;
use serde_json::Value;

use crate::proxy::error::ProxyError;

/// The upstreams this gateway fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceName {
    GoogleMaps,
    Weather,
    OpenAi,
    Unsplash,
}

impl ServiceName {
    pub const ALL: [ServiceName; 4] = [
        ServiceName::GoogleMaps,
        ServiceName::Weather,
        ServiceName::OpenAi,
        ServiceName::Unsplash,
    ];

    /// Wire name used by the generic proxy's `service=` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::GoogleMaps => "google_maps",
            ServiceName::Weather => "weather",
            ServiceName::OpenAi => "openai",
            ServiceName::Unsplash => "unsplash",
        }
    }

    pub fn parse(raw: &str) -> Option<ServiceName> {
        Self::ALL.iter().copied().find(|s| s.as_str() == raw)
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully prepared outbound request. Building one performs no I/O; the
/// upstream client issues exactly one call per prepared request.
#[derive(Debug)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Strategy record for one upstream service.
pub trait ServiceAdapter: Send + Sync {
    fn name(&self) -> ServiceName;

    /// Strip or clamp cost-sensitive fields before the body is forwarded.
    fn sanitize_body(&self, body: Option<Value>) -> Option<Value> {
        body
    }

    /// Build the outbound request for a generic-proxy call.
    fn build_request(
        &self,
        endpoint: &str,
        method: Method,
        params: &HashMap<String, String>,
        body: Option<Value>,
        credential: &str,
    ) -> Result<UpstreamRequest, ProxyError>;

    /// Pure reduction of the raw upstream JSON.
    fn shape_response(&self, endpoint: &str, raw: Value) -> Value;
}

/// Look up the adapter for a wire service name.
///
/// Fails before anything upstream-related is touched, so an unsupported
/// service never causes an outbound call.
pub fn resolve(service: &str) -> Result<&'static dyn ServiceAdapter, ProxyError> {
    let name = ServiceName::parse(service)
        .ok_or_else(|| ProxyError::BadRequest(format!("Unsupported service: {}", service)))?;
    Ok(adapter_for(name))
}

pub fn adapter_for(name: ServiceName) -> &'static dyn ServiceAdapter {
    match name {
        ServiceName::GoogleMaps => &google_maps::GoogleMapsAdapter,
        ServiceName::Weather => &weather::WeatherAdapter,
        ServiceName::OpenAi => &openai::OpenAiAdapter,
        ServiceName::Unsplash => &unsplash::UnsplashAdapter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_services_resolve() {
        for name in ServiceName::ALL {
            let adapter = resolve(name.as_str()).unwrap();
            assert_eq!(adapter.name(), name);
        }
    }

    #[test]
    fn unknown_service_is_a_client_error() {
        let err = resolve("unknown").err().unwrap();
        assert_eq!(err.to_string(), "Unsupported service: unknown");
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
