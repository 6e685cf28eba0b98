use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use crate::modules::config::Credentials;
use crate::proxy::handlers;
use crate::proxy::middleware;
use crate::proxy::rate_limit::RateLimiter;
use crate::proxy::upstream::UpstreamClient;

/// Axum application state
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<UpstreamClient>,
    pub credentials: Arc<Credentials>,
    pub limiter: Arc<RateLimiter>,
}

/// Axum server instance
pub struct AxumServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl AxumServer {
    /// Build the router with the shared middleware pipeline. Split out so
    /// tests can exercise routing without binding a socket.
    pub fn build_router(state: AppState) -> Router {
        Router::new()
            // Location service
            .route("/search", get(handlers::location::handle_search))
            .route("/geocode", get(handlers::location::handle_geocode))
            .route(
                "/reverse-geocode",
                get(handlers::location::handle_reverse_geocode),
            )
            .route("/nearby", get(handlers::location::handle_nearby))
            // Weather service
            .route("/current", get(handlers::weather::handle_current))
            .route("/forecast", get(handlers::weather::handle_forecast))
            // Generic credentialed proxy
            .route(
                "/proxy",
                get(handlers::generic::handle_proxy).post(handlers::generic::handle_proxy),
            )
            .route("/healthz", get(handlers::location::handle_health))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            // Outermost so preflight requests are answered before they ever
            // reach the rate limiter.
            .layer(middleware::cors_layer())
            .with_state(state)
    }

    /// Start the server; returns the instance and the serve task handle.
    pub async fn start(
        host: String,
        port: u16,
        credentials: Arc<Credentials>,
        limiter: Arc<RateLimiter>,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), String> {
        let state = AppState {
            upstream: Arc::new(
                UpstreamClient::new().map_err(|e| format!("upstream client: {}", e))?,
            ),
            credentials,
            limiter,
        };

        let app = Self::build_router(state);

        let addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| format!("failed to bind {}: {}", addr, e))?;

        tracing::info!("gateway server started at http://{}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let serve = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("gateway server stopped listening");
            });

            if let Err(e) = serve.await {
                tracing::error!("server error: {:?}", e);
            }
        });

        Ok((
            Self {
                shutdown_tx: Some(shutdown_tx),
            },
            handle,
        ))
    }

    /// Stop the server
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
