//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, inbound timeout).
    pub listener: ListenerConfig,

    /// Outbound call settings shared by every dependency.
    pub downstream: DownstreamConfig,

    /// Breaker defaults applied to dependencies without an override.
    pub breaker: BreakerConfig,

    /// Shared health flag store settings.
    pub shared_store: SharedStoreConfig,

    /// Protected downstream dependencies.
    pub dependencies: Vec<DependencyConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin surface settings.
    pub admin: AdminConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            downstream: DownstreamConfig::default(),
            breaker: BreakerConfig::default(),
            shared_store: SharedStoreConfig::default(),
            dependencies: vec![DependencyConfig {
                name: "ServiceB".to_string(),
                target: "http://127.0.0.1:8081/hello".to_string(),
                breaker: None,
            }],
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Breaker settings for a dependency, falling back to the defaults.
    pub fn breaker_for<'a>(&'a self, dependency: &'a DependencyConfig) -> &'a BreakerConfig {
        dependency.breaker.as_ref().unwrap_or(&self.breaker)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Inbound request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Outbound call configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Total time allowed for one downstream call in milliseconds.
    pub request_timeout_ms: u64,

    /// Largest response body buffered for relay to the caller.
    pub max_body_bytes: usize,
}

impl DownstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 1000,
            request_timeout_ms: 5000,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Circuit breaker parameters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Attempts required in the window before the ratio is evaluated.
    pub min_requests: u32,

    /// Failure ratio (0.0 - 1.0] at or above which the breaker trips.
    pub failure_ratio_threshold: f64,

    /// Seconds spent open before probes are allowed.
    pub open_cooldown_secs: u64,

    /// Probe budget while half-open; this many successes close the breaker.
    pub half_open_max_probes: u32,

    /// Seconds after which closed-state counts are discarded (0 = never).
    pub window_interval_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            min_requests: 3,
            failure_ratio_threshold: 0.6,
            open_cooldown_secs: 10,
            half_open_max_probes: 3,
            window_interval_secs: 5,
        }
    }
}

/// Shared health flag store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SharedStoreConfig {
    /// Use Redis for the shared flag. When false an in-process store is used.
    pub enabled: bool,

    /// Redis connection URL.
    pub url: String,

    /// Lease (TTL) written with an open flag, in seconds.
    pub lease_secs: u64,

    /// Deadline for each store round trip in milliseconds.
    pub io_timeout_ms: u64,

    /// Minimum delay between reconnect attempts in milliseconds.
    pub reconnect_interval_ms: u64,
}

impl SharedStoreConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl Default for SharedStoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "redis://127.0.0.1:6379".to_string(),
            lease_secs: 10,
            io_timeout_ms: 250,
            reconnect_interval_ms: 1000,
        }
    }
}

/// A protected downstream dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyConfig {
    /// Dependency name; also the middle segment of the shared flag key.
    pub name: String,

    /// Absolute http URL called for every protected request.
    pub target: String,

    /// Per-dependency breaker override.
    #[serde(default)]
    pub breaker: Option<BreakerConfig>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Expose `/admin/*` routes on the main listener.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
