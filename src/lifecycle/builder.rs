//! Fallible construction of a [`LifecycleSupervisor`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{dispatcher, Dispatch};

use super::startup::RegistrationHooks;
use super::supervisor::LifecycleSupervisor;
use crate::config::{validate_config, ConfigSource, ServiceConfig};
use crate::error::{BoxError, ServiceError};
use crate::http::router::GatewayRouter;
use crate::rpc::RpcServerHandle;

/// Builder for a service run.
///
/// ```no_run
/// # async fn demo() -> Result<(), hulk_boot::ServiceError> {
/// use hulk_boot::{ServiceBuilder, ServiceConfig};
///
/// let config = ServiceConfig { rpc_port: 9000, http_port: 8080, ..Default::default() };
/// ServiceBuilder::new(config)
///     .with_gateway(true)
///     .attach_gateway(|_ctx, router| {
///         router.get("/v1/ping", |_: serde_json::Value| async {
///             Ok::<_, tonic::Status>(serde_json::json!({ "pong": true }))
///         })?;
///         Ok(())
///     })
///     .build()?
///     .run()
///     .await
/// # }
/// ```
pub struct ServiceBuilder {
    config: ServiceConfig,
    hooks: RegistrationHooks,
    dispatch: Option<Dispatch>,
}

impl ServiceBuilder {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            hooks: RegistrationHooks::new(),
            dispatch: None,
        }
    }

    /// Start from keys read through a configuration source.
    pub fn from_source(name: &str, source: &dyn ConfigSource) -> Self {
        Self::new(ServiceConfig::from_source(name, source))
    }

    pub fn with_gateway(mut self, enabled: bool) -> Self {
        self.config.gateway_enabled = enabled;
        self
    }

    /// Serve the gateway on the RPC port.
    pub fn share_port(mut self, share: bool) -> Self {
        self.config.share_port = share;
        self
    }

    pub fn attach_rpc<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&mut RpcServerHandle) + Send + 'static,
    {
        self.hooks.set_rpc(hook);
        self
    }

    /// Register gateway routes. An error aborts the run before any socket is bound.
    pub fn attach_gateway<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(CancellationToken, &mut GatewayRouter) -> Result<(), BoxError> + Send + 'static,
    {
        self.hooks.set_gateway(hook);
        self
    }

    /// Log through `dispatch` instead of the caller's default subscriber.
    pub fn logger(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn gateway_drain(mut self, limit: Duration) -> Self {
        self.config.shutdown.gateway_drain_ms = millis(limit);
        self
    }

    /// Bound the RPC drain. `None` waits for in-flight calls indefinitely.
    pub fn rpc_drain(mut self, limit: Option<Duration>) -> Self {
        self.config.shutdown.rpc_drain_ms = limit.map(millis);
        self
    }

    pub fn build(self) -> Result<LifecycleSupervisor, ServiceError> {
        if let Err(errors) = validate_config(&self.config) {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ServiceError::Configuration(message));
        }

        if self.hooks.has_gateway() && !self.config.gateway_enabled {
            tracing::warn!(
                service = %self.config.name,
                "Gateway hook attached but gateway is disabled"
            );
        }

        let dispatch = self
            .dispatch
            .unwrap_or_else(|| dispatcher::get_default(|d| d.clone()));

        Ok(LifecycleSupervisor::new(self.config, self.hooks, dispatch))
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}
