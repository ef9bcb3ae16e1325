//! HTTP gateway server.
//!
//! # Responsibilities
//! - Wrap the registered gateway routes with the middleware stack
//! - Optionally multiplex RPC traffic onto the same router (shared port)
//! - Serve on a bound listener until cancelled, draining in-flight requests
//!
//! # Middleware (outermost first)
//! ```text
//! multiplex (shared port only) → request id → trace → propagate request id
//!     → metrics → CORS / preflight → routes
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::error::{ErrorSource, ServiceError};
use crate::http::middleware::{cors_middleware, multiplex_middleware};
use crate::http::router::GatewayRouter;
use crate::net::server::serve_router;
use crate::observability::metrics;

/// The HTTP front end translating JSON requests into RPC handler calls.
pub struct GatewayTranslator {
    router: Router,
    multiplexed: bool,
}

impl GatewayTranslator {
    /// Build the translator from the routes attached during registration.
    pub fn new(routes: GatewayRouter) -> Self {
        let router = routes
            .into_router()
            .layer(middleware::from_fn(cors_middleware))
            .layer(middleware::from_fn(track_request))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        Self {
            router,
            multiplexed: false,
        }
    }

    /// Route gRPC requests to `rpc` ahead of the gateway stack.
    pub fn multiplexed(self, rpc: tonic::service::Routes) -> Self {
        let rpc = rpc.into_axum_router();
        Self {
            router: self
                .router
                .layer(middleware::from_fn_with_state(rpc, multiplex_middleware)),
            multiplexed: true,
        }
    }

    pub fn is_multiplexed(&self) -> bool {
        self.multiplexed
    }

    /// The fully layered router.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests.
    ///
    /// Dropping the future force-closes every open connection.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServiceError> {
        let addr = listener
            .local_addr()
            .map_err(|e| ServiceError::serve(ErrorSource::Gateway, e))?;
        tracing::info!(
            address = %addr,
            multiplexed = self.multiplexed,
            "HTTP gateway serving"
        );

        serve_router(listener, self.router, shutdown).await;

        tracing::info!(address = %addr, "HTTP gateway stopped");
        Ok(())
    }
}

async fn track_request(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let response = next.run(request).await;
    let status = response.status().as_u16();

    tracing::debug!(
        method = %method,
        path = %path,
        client = ?client,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Gateway request"
    );
    metrics::record_gateway_request(&method, status, started);
    response
}
