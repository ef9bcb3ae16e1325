//! Port resolution and socket binding.
//!
//! # Responsibilities
//! - Resolve a listener's port from configuration
//! - Reject zero or out-of-range ports before any bind attempt
//! - Bind `"<host>:<port>"` and report failures as network errors

use tokio::net::TcpListener;

use crate::config::schema::{ServiceConfig, HTTP_PORT_KEY, RPC_PORT_KEY};
use crate::error::ServiceError;

/// Which listener a port is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    Rpc,
    Gateway,
}

impl PortRole {
    /// Config key the port is read from. A shared gateway reads the RPC key.
    pub fn key(&self, config: &ServiceConfig) -> &'static str {
        match self {
            PortRole::Rpc => RPC_PORT_KEY,
            PortRole::Gateway if config.share_port => RPC_PORT_KEY,
            PortRole::Gateway => HTTP_PORT_KEY,
        }
    }
}

/// Resolve the port for `role`.
pub fn resolve_port(config: &ServiceConfig, role: PortRole) -> Result<u16, ServiceError> {
    let key = role.key(config);
    let raw = match key {
        RPC_PORT_KEY => config.rpc_port,
        _ => config.http_port,
    };

    if raw == 0 {
        return Err(ServiceError::Configuration(format!(
            "{key} resolved to 0; a listen port is required"
        )));
    }

    u16::try_from(raw).map_err(|_| {
        ServiceError::Configuration(format!("{key} = {raw} is not a valid TCP port"))
    })
}

/// Format a listen address.
pub fn listen_address(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}

/// Bind a TCP listening socket on `host:port`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ServiceError> {
    let addr = listen_address(host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServiceError::Network {
            addr: addr.clone(),
            source,
        })?;

    let local_addr = listener
        .local_addr()
        .map_err(|source| ServiceError::Network {
            addr: addr.clone(),
            source,
        })?;

    tracing::debug!(address = %local_addr, "Listener bound");
    Ok(listener)
}
