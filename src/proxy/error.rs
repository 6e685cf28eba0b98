use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Gateway error taxonomy.
///
/// Validation and configuration errors are always detected before any
/// upstream call. Internal detail is logged, never sent to the caller.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },

    /// Missing credential or similar server-side misconfiguration.
    #[error("Service is not configured: {0}")]
    Misconfigured(String),

    /// Upstream answered with a failure status; propagated verbatim.
    #[error("Upstream error: {message}")]
    Upstream { status: u16, message: String },

    #[error("Internal server error")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ProxyError::RateLimited { retry_after } => json!({
                "error": "Rate limit exceeded",
                "message": format!("Too many requests. Try again in {} seconds.", retry_after),
            }),
            ProxyError::Upstream { status, message } => json!({
                "error": "Upstream error",
                "message": message,
                "details": format!("upstream responded with HTTP {}", status),
            }),
            ProxyError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                json!({
                    "error": "Internal server error",
                    "message": "An unexpected error occurred",
                })
            }
            other => json!({
                "error": other.to_string(),
            }),
        };

        let mut response = (status, Json(body)).into_response();

        if let ProxyError::RateLimited { retry_after } = self {
            if let Ok(value) = header::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        ProxyError::Internal(format!("upstream request failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_maps_to_429() {
        let err = ProxyError::RateLimited { retry_after: 60 };
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = err.into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "60"
        );
    }

    #[test]
    fn upstream_status_propagates_verbatim() {
        let err = ProxyError::Upstream {
            status: 503,
            message: "maintenance".to_string(),
        };
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn misconfiguration_is_a_server_error() {
        let err = ProxyError::Misconfigured("openai".to_string());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
