// Location handlers: place search, geocoding, reverse geocoding, nearby.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};
use serde_json::Value;
use tracing::debug;

use crate::proxy::error::ProxyError;
use crate::proxy::server::AppState;
use crate::proxy::services::{google_maps, ServiceName};
use crate::proxy::upstream::UpstreamResponse;
use crate::proxy::validate;

fn require_param<'a>(
    params: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, ProxyError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ProxyError::BadRequest(format!("Missing required parameter: {}", name)))
}

fn credential(state: &AppState) -> Result<&str, ProxyError> {
    state
        .credentials
        .get(ServiceName::GoogleMaps)
        .ok_or_else(|| ProxyError::Misconfigured("google_maps".to_string()))
}

/// Upstream said no at the HTTP level; relay its status and message.
fn check_http_status(response: &UpstreamResponse) -> Result<(), ProxyError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ProxyError::Upstream {
            status: response.status,
            message: response.error_message(),
        })
    }
}

/// GET /search?query=
pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ProxyError> {
    let query = validate::sanitize_query(require_param(&params, "query")?)?;
    debug!("place search: {:?}", query);

    let request = google_maps::build_text_search(&query, credential(&state)?);
    let response = state.upstream.send(request).await?;
    check_http_status(&response)?;
    google_maps::check_payload_status(&response.body)?;

    Ok(Json(google_maps::shape_search(&response.body)))
}

/// GET /geocode?address=
pub async fn handle_geocode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ProxyError> {
    let address = validate::sanitize_query(require_param(&params, "address")?)?;

    let request = google_maps::build_geocode(&address, credential(&state)?);
    let response = state.upstream.send(request).await?;
    check_http_status(&response)?;
    google_maps::check_payload_status(&response.body)?;

    Ok(Json(google_maps::shape_geocode(&response.body)))
}

/// GET /reverse-geocode?latitude=&longitude=
pub async fn handle_reverse_geocode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ProxyError> {
    let (lat, lng) = validate::parse_coordinates(
        require_param(&params, "latitude")?,
        require_param(&params, "longitude")?,
    )?;

    let request = google_maps::build_reverse_geocode(lat, lng, credential(&state)?);
    let response = state.upstream.send(request).await?;
    check_http_status(&response)?;
    google_maps::check_payload_status(&response.body)?;

    Ok(Json(google_maps::shape_geocode(&response.body)))
}

/// GET /nearby?latitude=&longitude=&radius=&type=
///
/// Radius is clamped, never rejected; an unrecognized type is dropped from
/// the upstream call rather than erroring.
pub async fn handle_nearby(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ProxyError> {
    let (lat, lng) = validate::parse_coordinates(
        require_param(&params, "latitude")?,
        require_param(&params, "longitude")?,
    )?;

    let radius = validate::clamp_radius(
        params
            .get("radius")
            .and_then(|r| r.parse::<f64>().ok())
            .unwrap_or(1000.0),
    );
    let place_type = params
        .get("type")
        .and_then(|t| validate::normalize_place_type(t));

    let request = google_maps::build_nearby(lat, lng, radius, place_type, credential(&state)?);
    let response = state.upstream.send(request).await?;
    check_http_status(&response)?;
    google_maps::check_payload_status(&response.body)?;

    Ok(Json(google_maps::shape_nearby(&response.body)))
}

/// GET /healthz
pub async fn handle_health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_is_a_bad_request() {
        let params = HashMap::new();
        let err = require_param(&params, "query").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Missing required parameter: query");
    }

    #[test]
    fn blank_parameter_counts_as_missing() {
        let mut params = HashMap::new();
        params.insert("address".to_string(), "   ".to_string());
        assert!(require_param(&params, "address").is_err());
    }

    #[test]
    fn upstream_http_failures_relay_status() {
        let response = UpstreamResponse {
            status: 403,
            body: serde_json::json!({ "error": { "message": "forbidden" } }),
        };
        let err = check_http_status(&response).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }
}
