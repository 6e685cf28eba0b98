use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};

/// CORS layer shared by every route.
///
/// Origin is wide open for now; the browser clients are served from
/// changing preview domains. TODO: pin allow_origin to the production site
/// domains once those are final.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
