//! Configuration for the relayer.

use crate::relay::BroadcastPolicy;

/// Mexico City, the location every relayer starts with.
pub const DEFAULT_LATITUDE: f64 = 19.4326;
pub const DEFAULT_LONGITUDE: f64 = -99.1332;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be a finite number")]
    NonFiniteCoordinate(&'static str),
}

/// Relayer configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub default_latitude: f64,
    pub default_longitude: f64,
    pub broadcast_policy: BroadcastPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = lookup("PORT")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(3000);
        let default_latitude: f64 = lookup("DEFAULT_LATITUDE")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_LATITUDE);
        let default_longitude: f64 = lookup("DEFAULT_LONGITUDE")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_LONGITUDE);
        if !default_latitude.is_finite() {
            return Err(ConfigError::NonFiniteCoordinate("DEFAULT_LATITUDE"));
        }
        if !default_longitude.is_finite() {
            return Err(ConfigError::NonFiniteCoordinate("DEFAULT_LONGITUDE"));
        }
        let broadcast_to_sender = lookup("BROADCAST_TO_SENDER")
            .and_then(|s| parse_bool(&s))
            .unwrap_or(true);
        let broadcast_policy = if broadcast_to_sender {
            BroadcastPolicy::All
        } else {
            BroadcastPolicy::ExcludeSender
        };

        Ok(Self {
            host,
            port,
            default_latitude,
            default_longitude,
            broadcast_policy,
        })
    }

    pub fn for_test() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            default_latitude: DEFAULT_LATITUDE,
            default_longitude: DEFAULT_LONGITUDE,
            broadcast_policy: BroadcastPolicy::All,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
