use once_cell::sync::Lazy;
use regex::Regex;

use crate::proxy::error::ProxyError;

// Characters allowed in free-text search queries after sanitization.
static QUERY_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s,.\-]").unwrap());

static CITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z\s,.\-]+$").unwrap());

pub const RADIUS_MIN_METERS: f64 = 50.0;
pub const RADIUS_MAX_METERS: f64 = 5000.0;

pub const FORECAST_DAYS_MIN: u32 = 1;
pub const FORECAST_DAYS_MAX: u32 = 7;

/// Place types we forward to the nearby-search upstream. Anything else is
/// silently omitted from the upstream call, never rejected.
const PLACE_TYPES: &[&str] = &[
    "restaurant",
    "cafe",
    "bar",
    "bakery",
    "park",
    "gym",
    "museum",
    "library",
    "movie_theater",
    "shopping_mall",
    "supermarket",
    "night_club",
];

/// Validate and sanitize a free-text query: length in [2,100] after trim,
/// then strip anything outside `[\w\s,.-]`.
pub fn sanitize_query(raw: &str) -> Result<String, ProxyError> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 || trimmed.len() > 100 {
        return Err(ProxyError::BadRequest(
            "Query must be between 2 and 100 characters".to_string(),
        ));
    }
    Ok(QUERY_STRIP_RE.replace_all(trimmed, "").into_owned())
}

/// Parse a latitude/longitude pair, rejecting NaN and out-of-range values.
pub fn parse_coordinates(latitude: &str, longitude: &str) -> Result<(f64, f64), ProxyError> {
    let lat: f64 = latitude
        .parse()
        .map_err(|_| ProxyError::BadRequest("Invalid latitude".to_string()))?;
    let lng: f64 = longitude
        .parse()
        .map_err(|_| ProxyError::BadRequest("Invalid longitude".to_string()))?;

    if lat.is_nan() || !(-90.0..=90.0).contains(&lat) {
        return Err(ProxyError::BadRequest(
            "Latitude must be between -90 and 90".to_string(),
        ));
    }
    if lng.is_nan() || !(-180.0..=180.0).contains(&lng) {
        return Err(ProxyError::BadRequest(
            "Longitude must be between -180 and 180".to_string(),
        ));
    }

    Ok((lat, lng))
}

/// Clamp a search radius to [50, 5000] meters. Never rejects.
pub fn clamp_radius(radius: f64) -> f64 {
    if radius.is_nan() {
        return RADIUS_MIN_METERS;
    }
    radius.clamp(RADIUS_MIN_METERS, RADIUS_MAX_METERS)
}

/// Allow-list check for nearby place types. Unknown types yield `None`.
pub fn normalize_place_type(raw: &str) -> Option<&'static str> {
    let lowered = raw.trim().to_ascii_lowercase();
    PLACE_TYPES.iter().copied().find(|t| *t == lowered)
}

/// Validate a city name for the weather service: length in [2,50], letters
/// and basic punctuation only.
pub fn validate_city(raw: &str) -> Result<String, ProxyError> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 || trimmed.len() > 50 {
        return Err(ProxyError::BadRequest(
            "City name must be between 2 and 50 characters".to_string(),
        ));
    }
    if !CITY_RE.is_match(trimmed) {
        return Err(ProxyError::BadRequest(
            "City name contains invalid characters".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Clamp the forecast horizon to [1, 7] days.
pub fn clamp_forecast_days(days: i64) -> u32 {
    days.clamp(FORECAST_DAYS_MIN as i64, FORECAST_DAYS_MAX as i64) as u32
}
