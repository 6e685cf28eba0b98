use std::collections::HashMap;
use std::env;

use tracing::{info, warn};

use crate::proxy::services::ServiceName;

/// Gateway runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen port
    pub port: u16,

    /// Allow LAN access
    /// - false: loopback only 127.0.0.1 (default)
    /// - true: bind 0.0.0.0
    pub allow_lan_access: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            allow_lan_access: false,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = env::var("ATLAS_PORT") {
            match value.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(e) => warn!("invalid ATLAS_PORT value {:?}: {}", value, e),
            }
        }

        if let Ok(value) = env::var("ATLAS_BIND") {
            if value != "127.0.0.1" && value != "localhost" {
                config.allow_lan_access = true;
            }
        }

        config
    }

    /// Actual bind address for the listener.
    pub fn bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }
}

/// Static service -> secret mapping, loaded at cold start and immutable for
/// the process lifetime. A missing entry is a server misconfiguration (500)
/// at request time, never a client error.
pub struct Credentials {
    secrets: HashMap<ServiceName, String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        let mut secrets = HashMap::new();

        for (service, var) in [
            (ServiceName::GoogleMaps, "GOOGLE_MAPS_API_KEY"),
            (ServiceName::Weather, "OPENWEATHER_API_KEY"),
            (ServiceName::OpenAi, "OPENAI_API_KEY"),
            (ServiceName::Unsplash, "UNSPLASH_ACCESS_KEY"),
        ] {
            match env::var(var) {
                Ok(secret) if !secret.trim().is_empty() => {
                    info!("loaded credential for {}", service);
                    secrets.insert(service, secret.trim().to_string());
                }
                _ => {}
            }
        }

        Self { secrets }
    }

    /// Build from an explicit map (tests).
    pub fn from_map(secrets: HashMap<ServiceName, String>) -> Self {
        Self { secrets }
    }

    pub fn get(&self, service: ServiceName) -> Option<&str> {
        self.secrets.get(&service).map(String::as_str)
    }

    /// Services without a configured secret.
    pub fn missing(&self) -> Vec<ServiceName> {
        ServiceName::ALL
            .iter()
            .copied()
            .filter(|s| !self.secrets.contains_key(s))
            .collect()
    }
}
