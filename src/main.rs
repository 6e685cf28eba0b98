use std::sync::Arc;

use atlas_gateway::modules;
use atlas_gateway::proxy;

#[tokio::main]
async fn main() -> Result<(), String> {
    modules::logger::init_logger();

    let mut config = modules::config::GatewayConfig::from_env();

    if let Ok(value) = std::env::var("ATLAS_ALLOW_LAN") {
        let enabled = matches!(value.as_str(), "1" | "true" | "yes" | "on");
        if enabled {
            config.allow_lan_access = true;
        }
    }

    let credentials = Arc::new(modules::config::Credentials::from_env());
    for service in credentials.missing() {
        tracing::warn!(
            "no credential configured for {}; requests to it will fail with 500",
            service
        );
    }

    let bind_address = config.bind_address().to_string();
    let port = config.port;

    let limiter = Arc::new(proxy::rate_limit::RateLimiter::in_memory());

    let (server, handle) =
        proxy::AxumServer::start(bind_address.clone(), port, credentials, limiter)
            .await
            .map_err(|e| format!("failed to start gateway: {}", e))?;

    tracing::info!(
        "atlas-gateway listening on http://{}:{}",
        bind_address,
        port
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown signal: {}", e))?;

    tracing::info!("shutdown requested, stopping server...");
    server.stop();
    let _ = handle.await;

    Ok(())
}
