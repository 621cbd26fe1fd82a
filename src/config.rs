use crate::data::DistributionStrategy;
use log::warn;
use std::net::SocketAddr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Address the HTTP server listens on.
    pub bind_addr: SocketAddr,

    /// Strategy used when a request does not name one.
    pub default_strategy: DistributionStrategy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            default_strategy: DistributionStrategy::Block,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let bind_addr = match lookup("SEATING_BIND_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("Ignoring SEATING_BIND_ADDR={raw}: {e}");
                defaults.bind_addr
            }),
            None => defaults.bind_addr,
        };

        let default_strategy = match lookup("SEATING_DEFAULT_STRATEGY") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("Ignoring SEATING_DEFAULT_STRATEGY: {e}");
                defaults.default_strategy
            }),
            None => defaults.default_strategy,
        };

        Self {
            bind_addr,
            default_strategy,
        }
    }
}
