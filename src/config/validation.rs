//! Configuration validation.
//!
//! Structural checks run when a service is built. Port values themselves are checked
//! later, when a listener resolves them, so a zero port still fails the run.
//! Returns all validation errors, not just the first.

use thiserror::Error;

use crate::config::schema::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service name is empty")]
    EmptyName,

    #[error("listen host is empty")]
    EmptyHost,

    #[error("gateway drain budget must be greater than zero")]
    ZeroGatewayDrain,

    #[error("gateway and rpc listeners both configured on port {0}; enable share_port to multiplex them")]
    PortConflict(i64),
}

/// Validate `config`, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }

    if config.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }

    if config.gateway_enabled && config.shutdown.gateway_drain_ms == 0 {
        errors.push(ValidationError::ZeroGatewayDrain);
    }

    if config.gateway_enabled
        && !config.share_port
        && config.rpc_port != 0
        && config.rpc_port == config.http_port
    {
        errors.push(ValidationError::PortConflict(config.rpc_port));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
