//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use shared_wire::duration_serde;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP listener configuration
    pub server: ServerConfig,
    /// Call and liveness timing
    pub timeouts: TimeoutConfig,
    /// Lock registry configuration
    pub locks: LockConfig,
    /// Activity log configuration
    pub activity: ActivityConfig,
}

impl BridgeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.legacy_port == Some(self.server.port) && self.server.port != 0 {
            return Err(ConfigError::DuplicatePorts);
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_bytes cannot be 0".into(),
            ));
        }

        let timeouts = [
            ("call", self.timeouts.call),
            ("host_liveness", self.timeouts.host_liveness),
            ("caller_liveness", self.timeouts.caller_liveness),
            ("sweep_interval", self.timeouts.sweep_interval),
            ("lock ttl", self.locks.ttl),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(ConfigError::InvalidTimeout(format!("{name} cannot be 0")));
            }
        }

        if self.activity.capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "activity capacity cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Primary listener address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Secondary listener address, if one is configured
    pub fn legacy_addr(&self) -> Option<SocketAddr> {
        self.server
            .legacy_port
            .map(|port| SocketAddr::new(self.server.host, port))
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port the host application polls
    pub port: u16,
    /// Optional second, fully independent bridge on another port
    pub legacy_port: Option<u16>,
    /// Request body size limit
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3002,
            legacy_port: None,
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a submitted call may wait for the host
    #[serde(with = "duration_serde")]
    pub call: Duration,
    /// Host is considered gone after this long without a poll
    #[serde(with = "duration_serde")]
    pub host_liveness: Duration,
    /// Caller is considered gone after this long without activity
    #[serde(with = "duration_serde")]
    pub caller_liveness: Duration,
    /// Maintenance tick: stale-call sweep and host timeout detection
    #[serde(with = "duration_serde")]
    pub sweep_interval: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call: Duration::from_secs(30),
            host_liveness: Duration::from_secs(10),
            caller_liveness: Duration::from_secs(15),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Default lock lifetime when the caller does not pass one
    #[serde(with = "duration_serde")]
    pub ttl: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Entries kept before the oldest is evicted
    pub capacity: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Primary and legacy listener share a port
    #[error("duplicate ports configured")]
    DuplicatePorts,
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}
