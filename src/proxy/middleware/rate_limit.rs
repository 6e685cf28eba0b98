//! Request throttling middleware.
//!
//! Applied once on the router so every proxied route shares the same
//! pipeline instead of re-implementing the check per handler.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::proxy::error::ProxyError;
use crate::proxy::rate_limit::{Decision, Quota};
use crate::proxy::server::AppState;

/// Client identity the limiter keys on, stored in request extensions so
/// handlers can apply additional scoped quotas.
#[derive(Debug, Clone)]
pub struct ClientKey(pub String);

/// Per-route quotas. Routes without an entry (health checks) bypass the
/// limiter entirely.
pub fn route_quota(path: &str) -> Option<(&'static str, Quota)> {
    match path {
        "/search" => Some(("search", Quota::per_minute(10))),
        "/geocode" => Some(("geocode", Quota::per_minute(10))),
        "/reverse-geocode" => Some(("reverse-geocode", Quota::per_minute(10))),
        "/nearby" => Some(("nearby", Quota::per_minute(10))),
        "/current" => Some(("current", Quota::per_minute(30))),
        "/forecast" => Some(("forecast", Quota::per_minute(30))),
        "/proxy" => Some(("proxy", Quota::per_minute(20))),
        _ => None,
    }
}

/// Resolve the caller identity: forwarded headers first (the gateway sits
/// behind an edge proxy in production), then the socket peer address.
fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
    {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);

    if let Some((scope, quota)) = route_quota(request.uri().path()) {
        match state.limiter.check(scope, &key, quota) {
            Decision::Allowed => {}
            Decision::Rejected { retry_after } => {
                tracing::warn!(
                    "rate limit hit: scope={} client={} retry_after={}s",
                    scope,
                    key,
                    retry_after
                );
                return ProxyError::RateLimited { retry_after }.into_response();
            }
        }
    }

    request.extensions_mut().insert(ClientKey(key));
    next.run(request).await
}
