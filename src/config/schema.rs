//! Configuration schema definitions.
//!
//! [`ServiceConfig`] is a typed snapshot of the keys a service consumes. Port values are
//! kept exactly as read; they are only checked when a listener resolves them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::source::ConfigSource;

/// Config key for the RPC listener port.
pub const RPC_PORT_KEY: &str = "grpc.port";
/// Config key for the HTTP gateway port.
pub const HTTP_PORT_KEY: &str = "http.port";
/// Config key for the deployment environment.
pub const ENV_KEY: &str = "app.env";

/// Default envelope `errcode` for translated RPC errors.
pub const DEFAULT_ERRCODE: i64 = 10000;
/// Default gateway drain budget.
pub const DEFAULT_GATEWAY_DRAIN: Duration = Duration::from_secs(3);

/// Root configuration for one service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name, used in logs and spans.
    pub name: String,

    /// Deployment environment; `"prod"` selects production behavior.
    pub env: String,

    /// Host part of every listen address.
    pub host: String,

    /// RPC listener port as configured (`grpc.port`).
    pub rpc_port: i64,

    /// Gateway listener port as configured (`http.port`).
    pub http_port: i64,

    /// Serve the gateway on the RPC port.
    pub share_port: bool,

    /// Start the HTTP gateway alongside the RPC listener.
    pub gateway_enabled: bool,

    pub gateway: GatewayConfig,

    pub shutdown: ShutdownConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "service".to_string(),
            env: "dev".to_string(),
            host: "0.0.0.0".to_string(),
            rpc_port: 0,
            http_port: 0,
            share_port: false,
            gateway_enabled: false,
            gateway: GatewayConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Read every service key from `source`, falling back to defaults.
    pub fn from_source(name: &str, source: &dyn ConfigSource) -> Self {
        let defaults = Self::default();
        let name = source.get_string_or("app.name", name);

        let rpc_drain = source.get_int("shutdown.rpc_drain_ms");

        Self {
            name,
            env: source.get_string_or(ENV_KEY, &defaults.env),
            host: source.get_string_or("app.host", &defaults.host),
            rpc_port: source.get_int(RPC_PORT_KEY),
            http_port: source.get_int(HTTP_PORT_KEY),
            share_port: source.get_bool_or("gateway.share_port", defaults.share_port),
            gateway_enabled: source.get_bool_or("gateway.enabled", defaults.gateway_enabled),
            gateway: GatewayConfig {
                errcode: source.get_int_or("gateway.errcode", defaults.gateway.errcode),
                body_limit: source
                    .get_int_or("gateway.body_limit", defaults.gateway.body_limit as i64)
                    .max(0) as usize,
            },
            shutdown: ShutdownConfig {
                gateway_drain_ms: source
                    .get_int_or(
                        "shutdown.gateway_drain_ms",
                        defaults.shutdown.gateway_drain_ms as i64,
                    )
                    .max(0) as u64,
                rpc_drain_ms: (rpc_drain > 0).then_some(rpc_drain as u64),
            },
        }
    }

    /// Whether the gateway and RPC server are multiplexed on one socket.
    pub fn is_multiplexed(&self) -> bool {
        self.gateway_enabled && self.share_port
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// `errcode` placed in every error envelope.
    pub errcode: i64,

    /// Maximum request body size in bytes.
    pub body_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            errcode: DEFAULT_ERRCODE,
            body_limit: 4 * 1024 * 1024,
        }
    }
}

/// Drain budgets for the shutdown sequence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Gateway drain budget in milliseconds before the listener is force-closed.
    pub gateway_drain_ms: u64,

    /// RPC drain budget in milliseconds. `None` waits for in-flight calls indefinitely.
    pub rpc_drain_ms: Option<u64>,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            gateway_drain_ms: DEFAULT_GATEWAY_DRAIN.as_millis() as u64,
            rpc_drain_ms: None,
        }
    }
}

impl ShutdownConfig {
    pub fn gateway_drain(&self) -> Duration {
        Duration::from_millis(self.gateway_drain_ms)
    }

    pub fn rpc_drain(&self) -> Option<Duration> {
        self.rpc_drain_ms.map(Duration::from_millis)
    }
}
