//! Startup orchestration.
//!
//! # Responsibilities
//! - Run the registration hooks, synchronously and exactly once
//! - Resolve every listen port, then bind every socket
//! - Hand the bound sockets to the supervisor; nothing is spawned here
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and nothing is retried
//! - Hooks run before any bind, so a failed hook never leaves a socket open
//! - All ports resolve before the first bind

use std::fmt;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tonic::service::{Routes, RoutesBuilder};

use crate::config::ServiceConfig;
use crate::error::{BoxError, ServiceError};
use crate::http::router::GatewayRouter;
use crate::net::listener::{bind, resolve_port, PortRole};
use crate::rpc::RpcServerHandle;

/// Registers RPC services on the server handle.
pub type AttachRpc = Box<dyn FnOnce(&mut RpcServerHandle) + Send>;

/// Registers gateway routes. The token is cancelled when the run stops.
pub type AttachGateway =
    Box<dyn FnOnce(CancellationToken, &mut GatewayRouter) -> Result<(), BoxError> + Send>;

/// The embedding application's injection points.
#[derive(Default)]
pub struct RegistrationHooks {
    attach_rpc: Option<AttachRpc>,
    attach_gateway: Option<AttachGateway>,
}

impl fmt::Debug for RegistrationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationHooks")
            .field("attach_rpc", &self.attach_rpc.is_some())
            .field("attach_gateway", &self.attach_gateway.is_some())
            .finish()
    }
}

impl RegistrationHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rpc<F>(&mut self, hook: F)
    where
        F: FnOnce(&mut RpcServerHandle) + Send + 'static,
    {
        self.attach_rpc = Some(Box::new(hook));
    }

    pub fn set_gateway<F>(&mut self, hook: F)
    where
        F: FnOnce(CancellationToken, &mut GatewayRouter) -> Result<(), BoxError> + Send + 'static,
    {
        self.attach_gateway = Some(Box::new(hook));
    }

    pub fn has_gateway(&self) -> bool {
        self.attach_gateway.is_some()
    }
}

/// Everything the hooks registered.
pub(crate) struct Registered {
    pub routes: Routes,
    pub gateway: Option<GatewayRouter>,
}

/// Invoke the hooks. The gateway hook only runs when the gateway is enabled.
pub(crate) fn register(
    hooks: RegistrationHooks,
    config: &ServiceConfig,
    context: CancellationToken,
) -> Result<Registered, ServiceError> {
    let mut services = RoutesBuilder::default();
    if let Some(attach) = hooks.attach_rpc {
        attach(&mut services);
    }

    let gateway = if config.gateway_enabled {
        let mut router = GatewayRouter::new(&config.gateway);
        if let Some(attach) = hooks.attach_gateway {
            attach(context, &mut router).map_err(ServiceError::Registration)?;
        }
        tracing::debug!(routes = router.len(), "Gateway routes registered");
        Some(router)
    } else {
        if hooks.attach_gateway.is_some() {
            tracing::debug!("Gateway disabled; gateway hook skipped");
        }
        None
    };

    Ok(Registered {
        routes: services.routes(),
        gateway,
    })
}

/// Sockets bound for one run.
pub(crate) enum Bound {
    /// RPC and, when enabled, gateway on their own sockets.
    Separate {
        rpc: TcpListener,
        gateway: Option<TcpListener>,
    },
    /// One socket serving both protocols.
    Multiplexed(TcpListener),
}

/// Resolve ports, then bind. Sockets bound before a failure are closed on return.
pub(crate) async fn bind_listeners(config: &ServiceConfig) -> Result<Bound, ServiceError> {
    let rpc_port = resolve_port(config, PortRole::Rpc)?;

    if config.is_multiplexed() {
        let socket = bind(&config.host, rpc_port).await?;
        tracing::info!(port = rpc_port, "RPC and gateway share one socket");
        return Ok(Bound::Multiplexed(socket));
    }

    let http_port = if config.gateway_enabled {
        Some(resolve_port(config, PortRole::Gateway)?)
    } else {
        None
    };

    let rpc = bind(&config.host, rpc_port).await?;
    let gateway = match http_port {
        Some(port) => Some(bind(&config.host, port).await?),
        None => None,
    };

    Ok(Bound::Separate { rpc, gateway })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn config(rpc_port: i64, http_port: i64, gateway: bool) -> ServiceConfig {
        ServiceConfig {
            host: "127.0.0.1".into(),
            rpc_port,
            http_port,
            gateway_enabled: gateway,
            ..Default::default()
        }
    }

    #[test]
    fn gateway_hook_failure_is_registration_error() {
        let mut hooks = RegistrationHooks::new();
        hooks.set_gateway(|_ctx, _router| {
            Err(Box::new(io::Error::new(io::ErrorKind::Other, "no db")) as BoxError)
        });

        let result = register(hooks, &config(38911, 38912, true), CancellationToken::new());
        assert!(matches!(result, Err(ServiceError::Registration(_))));
    }

    #[test]
    fn gateway_hook_skipped_when_disabled() {
        let mut hooks = RegistrationHooks::new();
        hooks.set_gateway(|_ctx, _router| panic!("must not run"));

        let registered = register(hooks, &config(38911, 0, false), CancellationToken::new()).unwrap();
        assert!(registered.gateway.is_none());
    }

    #[test]
    fn rpc_hook_runs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut hooks = RegistrationHooks::new();
        hooks.set_rpc(move |_services| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        register(hooks, &config(38911, 0, false), CancellationToken::new()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_http_port_fails_before_any_bind() {
        let result = bind_listeners(&config(38913, 0, true)).await;
        assert!(matches!(result, Err(ServiceError::Configuration(_))));

        // The RPC port was never taken.
        let rebind = TcpListener::bind("127.0.0.1:38913").await;
        assert!(rebind.is_ok());
    }

    #[tokio::test]
    async fn shared_port_binds_once() {
        let mut config = config(38914, 0, true);
        config.share_port = true;
        let bound = bind_listeners(&config).await.unwrap();
        assert!(matches!(bound, Bound::Multiplexed(_)));
    }
}
