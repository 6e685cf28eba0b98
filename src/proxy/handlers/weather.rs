// Weather handlers: current conditions and daily forecast.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};
use serde_json::json;
use tracing::debug;

use crate::proxy::error::ProxyError;
use crate::proxy::server::AppState;
use crate::proxy::services::{weather, ServiceName, UpstreamRequest};
use crate::proxy::validate;

fn credential(state: &AppState) -> Result<&str, ProxyError> {
    state
        .credentials
        .get(ServiceName::Weather)
        .ok_or_else(|| ProxyError::Misconfigured("weather".to_string()))
}

/// Location selector shared by both weather routes: coordinates win when
/// both are supplied, city is the fallback.
fn build_location_request(
    params: &HashMap<String, String>,
    credential: &str,
) -> Result<UpstreamRequest, ProxyError> {
    match (params.get("latitude"), params.get("longitude")) {
        (Some(lat), Some(lng)) => {
            let (lat, lng) = validate::parse_coordinates(lat, lng)?;
            Ok(weather::build_current_by_coords(lat, lng, credential))
        }
        _ => match params.get("city") {
            Some(city) => {
                let city = validate::validate_city(city)?;
                Ok(weather::build_current_by_city(&city, credential))
            }
            None => Err(ProxyError::BadRequest(
                "Provide either latitude/longitude or city".to_string(),
            )),
        },
    }
}

/// GET /current?latitude=&longitude= or ?city=
pub async fn handle_current(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ProxyError> {
    let request = build_location_request(&params, credential(&state)?)?;
    debug!("current weather lookup");

    let response = state.upstream.send(request).await?;
    if !response.is_success() {
        return Err(ProxyError::Upstream {
            status: response.status,
            message: response.error_message(),
        });
    }

    Ok(Json(json!({
        "weather": weather::shape_current(&response.body)
    })))
}

/// GET /forecast?latitude=&longitude=&days=
pub async fn handle_forecast(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ProxyError> {
    let lat = params
        .get("latitude")
        .ok_or_else(|| ProxyError::BadRequest("Missing required parameter: latitude".to_string()))?;
    let lng = params
        .get("longitude")
        .ok_or_else(|| ProxyError::BadRequest("Missing required parameter: longitude".to_string()))?;
    let (lat, lng) = validate::parse_coordinates(lat, lng)?;

    let days = validate::clamp_forecast_days(
        params
            .get("days")
            .and_then(|d| d.parse::<i64>().ok())
            .unwrap_or(3),
    );

    let request = weather::build_forecast(lat, lng, days, credential(&state)?);
    let response = state.upstream.send(request).await?;
    if !response.is_success() {
        return Err(ProxyError::Upstream {
            status: response.status,
            message: response.error_message(),
        });
    }

    Ok(Json(json!({
        "forecast": weather::shape_forecast(&response.body, days)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_win_over_city() {
        let mut params = HashMap::new();
        params.insert("latitude".to_string(), "40.7".to_string());
        params.insert("longitude".to_string(), "-74.0".to_string());
        params.insert("city".to_string(), "Paris".to_string());

        let req = build_location_request(&params, "key").unwrap();
        assert!(req.query.iter().any(|(k, _)| k == "lat"));
        assert!(!req.query.iter().any(|(k, _)| k == "q"));
    }

    #[test]
    fn city_fallback() {
        let mut params = HashMap::new();
        params.insert("city".to_string(), "New York".to_string());

        let req = build_location_request(&params, "key").unwrap();
        assert!(req.query.iter().any(|(k, v)| k == "q" && v == "New York"));
    }

    #[test]
    fn neither_location_form_is_rejected() {
        let params = HashMap::new();
        let err = build_location_request(&params, "key").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_city_is_rejected_before_build() {
        let mut params = HashMap::new();
        params.insert("city".to_string(), "New York!".to_string());
        assert!(build_location_request(&params, "key").is_err());
    }
}
