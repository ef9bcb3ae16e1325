//! Protocol multiplexing for a shared RPC/gateway port.
//!
//! Requests whose `content-type` starts with `application/grpc` go to the RPC routes;
//! everything else continues into the gateway.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
    Router,
};
use tower::ServiceExt;

/// Whether `request` is a gRPC call.
pub fn is_grpc(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/grpc"))
}

pub async fn multiplex_middleware(
    State(rpc): State<Router>,
    request: Request,
    next: Next,
) -> Response {
    if !is_grpc(&request) {
        return next.run(request).await;
    }

    match rpc.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}
