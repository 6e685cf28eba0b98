// Unsplash adapter for the generic proxy: photo search and lookup.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::{json, Value};

use crate::proxy::error::ProxyError;
use crate::proxy::services::{ServiceAdapter, ServiceName, UpstreamRequest};

const BASE_URL: &str = "https://api.unsplash.com";

const RESULT_CAP: usize = 10;
const PER_PAGE_CAP: u64 = 30;

const ALLOWED_PARAMS: &[&str] = &["query", "page", "per_page", "orientation", "color"];

fn shape_photo(photo: &Value) -> Value {
    json!({
        "id": photo.get("id").cloned().unwrap_or(Value::Null),
        "description": photo
            .get("description")
            .cloned()
            .unwrap_or(Value::Null),
        "alt_description": photo
            .get("alt_description")
            .cloned()
            .unwrap_or(Value::Null),
        "urls": {
            "small": photo
                .get("urls")
                .and_then(|u| u.get("small"))
                .cloned()
                .unwrap_or(Value::Null),
            "regular": photo
                .get("urls")
                .and_then(|u| u.get("regular"))
                .cloned()
                .unwrap_or(Value::Null),
        },
        "credit": photo
            .get("user")
            .and_then(|u| u.get("name"))
            .cloned()
            .unwrap_or(Value::Null),
    })
}

pub struct UnsplashAdapter;

impl ServiceAdapter for UnsplashAdapter {
    fn name(&self) -> ServiceName {
        ServiceName::Unsplash
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
            if !ALLOWED_PARAMS.contains(&k.as_str()) {
                continue;
            }
            if k == "per_page" {
                let per_page = v.parse::<u64>().unwrap_or(RESULT_CAP as u64).min(PER_PAGE_CAP);
                req.query.push((k.clone(), per_page.to_string()));
            } else {
                req.query.push((k.clone(), v.clone()));
            }
        }
        req.headers
            .push(("authorization", format!("Client-ID {}", credential)));
        Ok(req)
    }

    fn shape_response(&self, _endpoint: &str, raw: Value) -> Value {
        // Search responses carry `results`; single-photo lookups are bare
        // photo objects.
        match raw.get("results").and_then(|r| r.as_array()) {
            Some(results) => json!({
                "total": raw.get("total").cloned().unwrap_or(Value::Null),
                "results": results
                    .iter()
                    .take(RESULT_CAP)
                    .map(shape_photo)
                    .collect::<Vec<_>>(),
            }),
            None if raw.is_object() => shape_photo(&raw),
            None => raw,
        }
    }
}
