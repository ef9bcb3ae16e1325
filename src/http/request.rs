//! Request decoding.
//!
//! # Responsibilities
//! - Decode GET/DELETE requests from the query string
//! - Decode every other method from a JSON body (empty body = `{}`)
//! - Report decode failures as `InvalidArgument`
//!
//! # Design Decisions
//! - Body size is bounded before parsing
//! - Request IDs are assigned by middleware, not here

use axum::{
    body::Body,
    extract::{Query, Request},
    http::Method,
};
use serde::de::DeserializeOwned;
use tonic::Status;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Decode an RPC request message from an HTTP request.
pub async fn decode_request<T>(request: Request<Body>, body_limit: usize) -> Result<T, Status>
where
    T: DeserializeOwned,
{
    let (parts, body) = request.into_parts();

    if matches!(parts.method, Method::GET | Method::DELETE) {
        return Query::<T>::try_from_uri(&parts.uri)
            .map(|Query(value)| value)
            .map_err(|e| Status::invalid_argument(e.body_text()));
    }

    let bytes = axum::body::to_bytes(body, body_limit)
        .await
        .map_err(|e| Status::invalid_argument(format!("failed to read request body: {e}")))?;

    let payload: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &bytes
    };

    serde_json::from_slice(payload)
        .map_err(|e| Status::invalid_argument(format!("invalid request body: {e}")))
}
