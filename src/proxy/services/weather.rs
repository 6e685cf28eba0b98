// OpenWeather adapter: current conditions and daily forecast.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};

use crate::proxy::error::ProxyError;
use crate::proxy::services::{ServiceAdapter, ServiceName, UpstreamRequest};

const BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

// Parameters the generic proxy is allowed to forward; everything else is
// dropped before the upstream call.
const ALLOWED_PARAMS: &[&str] = &["lat", "lon", "q", "id", "units", "lang", "cnt"];

pub fn build_current_by_coords(lat: f64, lng: f64, credential: &str) -> UpstreamRequest {
    let mut req = UpstreamRequest::get(format!("{}/weather", BASE_URL));
    req.query.push(("lat".to_string(), lat.to_string()));
    req.query.push(("lon".to_string(), lng.to_string()));
    req.query.push(("units".to_string(), "metric".to_string()));
    req.query.push(("appid".to_string(), credential.to_string()));
    req
}

pub fn build_current_by_city(city: &str, credential: &str) -> UpstreamRequest {
    let mut req = UpstreamRequest::get(format!("{}/weather", BASE_URL));
    req.query.push(("q".to_string(), city.to_string()));
    req.query.push(("units".to_string(), "metric".to_string()));
    req.query.push(("appid".to_string(), credential.to_string()));
    req
}

pub fn build_forecast(lat: f64, lng: f64, days: u32, credential: &str) -> UpstreamRequest {
    let mut req = UpstreamRequest::get(format!("{}/forecast/daily", BASE_URL));
    req.query.push(("lat".to_string(), lat.to_string()));
    req.query.push(("lon".to_string(), lng.to_string()));
    req.query.push(("cnt".to_string(), days.to_string()));
    req.query.push(("units".to_string(), "metric".to_string()));
    req.query.push(("appid".to_string(), credential.to_string()));
    req
}

/// Reduce a raw current-conditions payload. The OpenWeather `sys`/`coord`/
/// `main` nesting never reaches the client.
pub fn shape_current(raw: &Value) -> Value {
    let weather = raw
        .get("weather")
        .and_then(|w| w.as_array())
        .and_then(|arr| arr.first());

    json!({
        "location": {
            "name": raw.get("name").cloned().unwrap_or(Value::Null),
            "country": raw
                .get("sys")
                .and_then(|s| s.get("country"))
                .cloned()
                .unwrap_or(Value::Null),
        },
        "current": {
            "temperature": raw
                .get("main")
                .and_then(|m| m.get("temp"))
                .cloned()
                .unwrap_or(Value::Null),
            "feels_like": raw
                .get("main")
                .and_then(|m| m.get("feels_like"))
                .cloned()
                .unwrap_or(Value::Null),
            "humidity": raw
                .get("main")
                .and_then(|m| m.get("humidity"))
                .cloned()
                .unwrap_or(Value::Null),
            "condition": weather
                .and_then(|w| w.get("main"))
                .cloned()
                .unwrap_or(Value::Null),
            "description": weather
                .and_then(|w| w.get("description"))
                .cloned()
                .unwrap_or(Value::Null),
            "wind_speed": raw
                .get("wind")
                .and_then(|w| w.get("speed"))
                .cloned()
                .unwrap_or(Value::Null),
        }
    })
}

fn format_day(dt: i64) -> Value {
    match DateTime::<Utc>::from_timestamp(dt, 0) {
        Some(ts) => json!(ts.format("%Y-%m-%d").to_string()),
        None => Value::Null,
    }
}

/// Reduce a daily-forecast payload to at most `days` entries.
pub fn shape_forecast(raw: &Value, days: u32) -> Value {
    let entries: Vec<Value> = raw
        .get("list")
        .and_then(|l| l.as_array())
        .map(|arr| {
            arr.iter()
                .take(days as usize)
                .map(|day| {
                    let weather = day
                        .get("weather")
                        .and_then(|w| w.as_array())
                        .and_then(|a| a.first());
                    json!({
                        "date": day
                            .get("dt")
                            .and_then(|d| d.as_i64())
                            .map(format_day)
                            .unwrap_or(Value::Null),
                        "temperature_min": day
                            .get("temp")
                            .and_then(|t| t.get("min"))
                            .cloned()
                            .unwrap_or(Value::Null),
                        "temperature_max": day
                            .get("temp")
                            .and_then(|t| t.get("max"))
                            .cloned()
                            .unwrap_or(Value::Null),
                        "condition": weather
                            .and_then(|w| w.get("main"))
                            .cloned()
                            .unwrap_or(Value::Null),
                        "description": weather
                            .and_then(|w| w.get("description"))
                            .cloned()
                            .unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "location": {
            "name": raw
                .get("city")
                .and_then(|c| c.get("name"))
                .cloned()
                .unwrap_or(Value::Null),
            "country": raw
                .get("city")
                .and_then(|c| c.get("country"))
                .cloned()
                .unwrap_or(Value::Null),
        },
        "days": entries,
    })
}

pub struct WeatherAdapter;

impl ServiceAdapter for WeatherAdapter {
    fn name(&self) -> ServiceName {
        ServiceName::Weather
    }

    fn build_request(
        &self,
        endpoint: &str,
        _method: Method,
        params: &HashMap<String, String>,
        _body: Option<Value>,
        credential: &str,
    ) -> Result<UpstreamRequest, ProxyError> {
        let path = endpoint.trim_matches('/');
        if path.is_empty() {
            return Err(ProxyError::BadRequest("Missing endpoint".to_string()));
        }

        let mut req = UpstreamRequest::get(format!("{}/{}", BASE_URL, path));
        for (k, v) in params {
            if ALLOWED_PARAMS.contains(&k.as_str()) {
                req.query.push((k.clone(), v.clone()));
            }
        }
        req.query
            .push(("appid".to_string(), credential.to_string()));
        Ok(req)
    }

    fn shape_response(&self, endpoint: &str, raw: Value) -> Value {
        let path = endpoint.trim_matches('/');
        if path == "weather" {
            shape_current(&raw)
        } else if path.starts_with("forecast") {
            // The payload echoes the request's `cnt`; honor it so a
            // cnt=3 call never comes back with more than 3 entries.
            let days = raw
                .get("cnt")
                .and_then(|c| c.as_u64())
                .map(|c| (c as u32).min(crate::proxy::validate::FORECAST_DAYS_MAX))
                .unwrap_or(crate::proxy::validate::FORECAST_DAYS_MAX);
            shape_forecast(&raw, days)
        } else {
            raw
        }
    }
}
