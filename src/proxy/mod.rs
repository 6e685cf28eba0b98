// proxy module - rate-limited gateway for third-party APIs

pub mod error;
pub mod handlers; // API endpoint handlers
pub mod middleware; // axum middleware
pub mod rate_limit; // fixed-window request throttling
pub mod server;
pub mod services; // per-service validate/build/shape adapters
pub mod upstream; // upstream client
pub mod validate; // shared parameter validation

pub use error::ProxyError;
pub use server::AxumServer;
