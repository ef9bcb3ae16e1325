//! RPC serve loop.

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tonic::service::{Routes, RoutesBuilder};

use crate::error::{ErrorSource, ServiceError};
use crate::net::server::serve_router;

/// Handle passed to the RPC registration hook.
pub type RpcServerHandle = RoutesBuilder;

/// The RPC listener: a bound socket plus the services registered on it.
pub struct RpcListener {
    listener: TcpListener,
    routes: Routes,
}

impl RpcListener {
    pub fn new(listener: TcpListener, routes: Routes) -> Self {
        Self { listener, routes }
    }

    /// Serve until `shutdown` is cancelled.
    ///
    /// On cancellation the server stops accepting and waits for in-flight calls.
    /// Dropping the future force-closes every open connection.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ServiceError> {
        let addr = self
            .listener
            .local_addr()
            .map_err(|e| ServiceError::serve(ErrorSource::Rpc, e))?;
        tracing::info!(address = %addr, "RPC listener serving");

        serve_router(self.listener, self.routes.into_axum_router(), shutdown).await;

        tracing::info!(address = %addr, "RPC listener stopped");
        Ok(())
    }
}
