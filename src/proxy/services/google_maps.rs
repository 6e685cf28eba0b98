// Google Maps adapter: place search, geocoding and nearby search.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::{json, Value};

use crate::proxy::error::ProxyError;
use crate::proxy::services::{ServiceAdapter, ServiceName, UpstreamRequest};

const BASE_URL: &str = "https://maps.googleapis.com/maps/api";

pub const SEARCH_RESULT_CAP: usize = 10;
pub const NEARBY_RESULT_CAP: usize = 15;
const PLACE_TYPES_CAP: usize = 3;

// Client-supplied parameters that must never reach the upstream; the
// gateway injects its own credential.
const STRIPPED_PARAMS: &[&str] = &["key", "client", "signature", "channel"];

pub fn build_text_search(query: &str, credential: &str) -> UpstreamRequest {
    let mut req = UpstreamRequest::get(format!("{}/place/textsearch/json", BASE_URL));
    req.query.push(("query".to_string(), query.to_string()));
    req.query.push(("key".to_string(), credential.to_string()));
    req
}

pub fn build_geocode(address: &str, credential: &str) -> UpstreamRequest {
    let mut req = UpstreamRequest::get(format!("{}/geocode/json", BASE_URL));
    req.query.push(("address".to_string(), address.to_string()));
    req.query.push(("key".to_string(), credential.to_string()));
    req
}

pub fn build_reverse_geocode(lat: f64, lng: f64, credential: &str) -> UpstreamRequest {
    let mut req = UpstreamRequest::get(format!("{}/geocode/json", BASE_URL));
    req.query.push(("latlng".to_string(), format!("{},{}", lat, lng)));
    req.query.push(("key".to_string(), credential.to_string()));
    req
}

pub fn build_nearby(
    lat: f64,
    lng: f64,
    radius: f64,
    place_type: Option<&str>,
    credential: &str,
) -> UpstreamRequest {
    let mut req = UpstreamRequest::get(format!("{}/place/nearbysearch/json", BASE_URL));
    req.query
        .push(("location".to_string(), format!("{},{}", lat, lng)));
    req.query
        .push(("radius".to_string(), format!("{}", radius as i64)));
    if let Some(t) = place_type {
        req.query.push(("type".to_string(), t.to_string()));
    }
    req.query.push(("key".to_string(), credential.to_string()));
    req
}

/// Google signals failure inside a 200 payload via the `status` field.
/// Map those to proper HTTP error classes before shaping.
pub fn check_payload_status(raw: &Value) -> Result<(), ProxyError> {
    let status = raw.get("status").and_then(|s| s.as_str()).unwrap_or("OK");
    match status {
        "OK" => Ok(()),
        "ZERO_RESULTS" => Err(ProxyError::NotFound("No results found".to_string())),
        other => {
            let message = raw
                .get("error_message")
                .and_then(|m| m.as_str())
                .unwrap_or(other);
            Err(ProxyError::BadRequest(format!(
                "Geocoding failed: {}",
                message
            )))
        }
    }
}

fn shape_place(place: &Value, address_field: &str) -> Value {
    let mut shaped = json!({
        "name": place.get("name").cloned().unwrap_or(Value::Null),
        "address": place.get(address_field).cloned().unwrap_or(Value::Null),
        "location": place
            .get("geometry")
            .and_then(|g| g.get("location"))
            .cloned()
            .unwrap_or(Value::Null),
    });

    if let Some(rating) = place.get("rating") {
        shaped["rating"] = rating.clone();
    }
    if let Some(types) = place.get("types").and_then(|t| t.as_array()) {
        shaped["types"] = Value::Array(types.iter().take(PLACE_TYPES_CAP).cloned().collect());
    }
    if let Some(open_now) = place
        .get("opening_hours")
        .and_then(|o| o.get("open_now"))
    {
        shaped["open_now"] = open_now.clone();
    }

    shaped
}

/// Top 10 text-search results, reduced to the fields the client renders.
pub fn shape_search(raw: &Value) -> Value {
    let results: Vec<Value> = raw
        .get("results")
        .and_then(|r| r.as_array())
        .map(|arr| {
            arr.iter()
                .take(SEARCH_RESULT_CAP)
                .map(|p| shape_place(p, "formatted_address"))
                .collect()
        })
        .unwrap_or_default();

    json!({ "results": results })
}

/// Top 15 nearby places; `vicinity` is the short-form address nearby search
/// returns instead of `formatted_address`.
pub fn shape_nearby(raw: &Value) -> Value {
    let results: Vec<Value> = raw
        .get("results")
        .and_then(|r| r.as_array())
        .map(|arr| {
            arr.iter()
                .take(NEARBY_RESULT_CAP)
                .map(|p| shape_place(p, "vicinity"))
                .collect()
        })
        .unwrap_or_default();

    json!({ "results": results })
}

/// First geocoding result only: address, coordinates and place id.
pub fn shape_geocode(raw: &Value) -> Value {
    let first = raw
        .get("results")
        .and_then(|r| r.as_array())
        .and_then(|arr| arr.first());

    match first {
        Some(result) => json!({
            "address": result.get("formatted_address").cloned().unwrap_or(Value::Null),
            "location": result
                .get("geometry")
                .and_then(|g| g.get("location"))
                .cloned()
                .unwrap_or(Value::Null),
            "place_id": result.get("place_id").cloned().unwrap_or(Value::Null),
        }),
        None => json!({ "address": null, "location": null, "place_id": null }),
    }
}

pub struct GoogleMapsAdapter;

impl ServiceAdapter for GoogleMapsAdapter {
    fn name(&self) -> ServiceName {
        ServiceName::GoogleMaps
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

        // Maps endpoints are all GET with query parameters.
        let mut req = UpstreamRequest::get(format!("{}/{}/json", BASE_URL, path));
        for (k, v) in params {
            if STRIPPED_PARAMS.contains(&k.as_str()) {
                continue;
            }
            req.query.push((k.clone(), v.clone()));
        }
        req.query.push(("key".to_string(), credential.to_string()));
        Ok(req)
    }

    fn shape_response(&self, _endpoint: &str, mut raw: Value) -> Value {
        if let Some(obj) = raw.as_object_mut() {
            obj.remove("html_attributions");
            if let Some(results) = obj.get_mut("results").and_then(|r| r.as_array_mut()) {
                results.truncate(SEARCH_RESULT_CAP);
            }
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_search_payload(count: usize) -> Value {
        let results: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "name": format!("Place {}", i),
                    "formatted_address": format!("{} Main St", i),
                    "geometry": { "location": { "lat": 40.0 + i as f64, "lng": -74.0 } },
                    "rating": 4.2,
                    "types": ["restaurant", "food", "point_of_interest", "establishment"],
                    "photos": [{ "photo_reference": "secret" }],
                })
            })
            .collect();
        json!({ "status": "OK", "results": results })
    }

    #[test]
    fn search_caps_at_ten_and_narrows_fields() {
        let shaped = shape_search(&sample_search_payload(25));
        let results = shaped["results"].as_array().unwrap();
        assert_eq!(results.len(), SEARCH_RESULT_CAP);

        let first = &results[0];
        assert_eq!(first["name"], "Place 0");
        assert_eq!(first["address"], "0 Main St");
        assert_eq!(first["location"]["lat"], 40.0);
        assert_eq!(first["types"].as_array().unwrap().len(), 3);
        assert!(first.get("photos").is_none());
    }

    #[test]
    fn nearby_caps_at_fifteen() {
        let mut payload = sample_search_payload(20);
        // Nearby search uses vicinity instead of formatted_address.
        for p in payload["results"].as_array_mut().unwrap() {
            p["vicinity"] = json!("nearby street");
        }
        let shaped = shape_nearby(&payload);
        let results = shaped["results"].as_array().unwrap();
        assert_eq!(results.len(), NEARBY_RESULT_CAP);
        assert_eq!(results[0]["address"], "nearby street");
    }

    #[test]
    fn geocode_takes_first_result() {
        let payload = json!({
            "status": "OK",
            "results": [
                {
                    "formatted_address": "1 First Ave",
                    "geometry": { "location": { "lat": 1.0, "lng": 2.0 } },
                    "place_id": "abc"
                },
                { "formatted_address": "2 Second Ave" }
            ]
        });
        let shaped = shape_geocode(&payload);
        assert_eq!(shaped["address"], "1 First Ave");
        assert_eq!(shaped["place_id"], "abc");
    }

    #[test]
    fn payload_status_mapping() {
        assert!(check_payload_status(&json!({ "status": "OK" })).is_ok());

        let not_found = check_payload_status(&json!({ "status": "ZERO_RESULTS" })).unwrap_err();
        assert_eq!(not_found.status(), axum::http::StatusCode::NOT_FOUND);

        let denied = check_payload_status(&json!({
            "status": "REQUEST_DENIED",
            "error_message": "API key invalid"
        }))
        .unwrap_err();
        assert_eq!(denied.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(denied.to_string().contains("API key invalid"));
    }

    #[test]
    fn adapter_strips_client_credentials() {
        let mut params = HashMap::new();
        params.insert("query".to_string(), "coffee".to_string());
        params.insert("key".to_string(), "attacker-key".to_string());
        params.insert("signature".to_string(), "sig".to_string());

        let req = GoogleMapsAdapter
            .build_request("place/textsearch", Method::GET, &params, None, "real-key")
            .unwrap();

        assert!(req.url.ends_with("/place/textsearch/json"));
        assert!(req.query.iter().any(|(k, v)| k == "key" && v == "real-key"));
        assert!(!req.query.iter().any(|(_, v)| v == "attacker-key"));
        assert!(!req.query.iter().any(|(k, _)| k == "signature"));
    }
}
