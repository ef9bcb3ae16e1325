//! Gateway route registration.
//!
//! Registration hooks attach typed handlers here. Each handler receives the decoded
//! request message and returns the RPC result; the router takes care of JSON encoding on
//! success and of the error envelope on failure.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;

use axum::{
    body::Body,
    extract::Request,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{on, MethodFilter, MethodRouter},
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tonic::Status;

use crate::config::schema::GatewayConfig;
use crate::http::request::decode_request;
use crate::http::response::{CallError, ErrorTranslator};

/// Error returned when a route cannot be registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route {method} {path} is already registered")]
    Duplicate { method: Method, path: String },

    #[error("method {0} cannot be routed")]
    UnsupportedMethod(Method),

    #[error("invalid route path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("route path {path} conflicts with {existing}")]
    Conflict { path: String, existing: String },
}

impl RouteError {
    fn invalid(path: &str, reason: &'static str) -> Self {
        RouteError::InvalidPath {
            path: path.to_string(),
            reason,
        }
    }
}

/// One `/`-separated piece of a route path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Static(&'a str),
    Capture(&'a str),
    CatchAll(&'a str),
}

/// Split a route path into segments, rejecting anything the axum router would panic on.
fn parse_path(path: &str) -> Result<Vec<Segment<'_>>, RouteError> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(RouteError::invalid(path, "must start with '/'"));
    };

    let pieces: Vec<&str> = rest.split('/').collect();
    let last = pieces.len() - 1;
    let mut segments = Vec::with_capacity(pieces.len());

    for (i, piece) in pieces.into_iter().enumerate() {
        if piece.starts_with(':') || piece.starts_with('*') {
            return Err(RouteError::invalid(
                path,
                "captures are written {name} or {*name}",
            ));
        }

        let segment = match piece.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
            Some(inner) => {
                let (name, catch_all) = match inner.strip_prefix('*') {
                    Some(name) => (name, true),
                    None => (inner, false),
                };
                if name.is_empty() || name.contains(['{', '}', '*']) {
                    return Err(RouteError::invalid(path, "capture needs a plain name"));
                }
                if catch_all {
                    if i != last {
                        return Err(RouteError::invalid(path, "{*name} must be the last segment"));
                    }
                    Segment::CatchAll(name)
                } else {
                    Segment::Capture(name)
                }
            }
            None if piece.contains(['{', '}']) => {
                return Err(RouteError::invalid(path, "a capture must fill its whole segment"));
            }
            None => Segment::Static(piece),
        };
        segments.push(segment);
    }

    Ok(segments)
}

/// Whether two distinct paths cannot live in one router: a capture at the same
/// position under a different name, or a capture against a catch-all.
fn conflicts(a: &[Segment<'_>], b: &[Segment<'_>]) -> bool {
    for (x, y) in a.iter().zip(b) {
        match (x, y) {
            (Segment::Static(x), Segment::Static(y)) if x == y => continue,
            (Segment::Capture(x), Segment::Capture(y)) if x == y => continue,
            (Segment::CatchAll(x), Segment::CatchAll(y)) if x == y => continue,
            (Segment::Static(_), _) | (_, Segment::Static(_)) => return false,
            _ => return true,
        }
    }
    false
}

/// Route table the gateway registration hook writes into.
pub struct GatewayRouter {
    routes: BTreeMap<String, MethodRouter>,
    registered: HashSet<(Method, String)>,
    translator: ErrorTranslator,
    body_limit: usize,
}

impl std::fmt::Debug for GatewayRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRouter")
            .field("routes", &self.registered.len())
            .field("translator", &self.translator)
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

impl Default for GatewayRouter {
    fn default() -> Self {
        Self::new(&GatewayConfig::default())
    }
}

impl GatewayRouter {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            routes: BTreeMap::new(),
            registered: HashSet::new(),
            translator: ErrorTranslator::new(config.errcode),
            body_limit: config.body_limit,
        }
    }

    /// Register `handler` for `method` on `path`.
    ///
    /// `path` uses axum syntax (`/v1/orders/{id}`, `/v1/files/{*rest}`). Paths that
    /// would clash with an already registered one are rejected here rather than when
    /// the gateway starts.
    pub fn handle<Req, Resp, E, F, Fut>(
        &mut self,
        method: Method,
        path: &str,
        handler: F,
    ) -> Result<&mut Self, RouteError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        E: Into<CallError> + Send + 'static,
        F: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        let segments = parse_path(path)?;
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| RouteError::UnsupportedMethod(method.clone()))?;
        if !self.routes.contains_key(path) {
            let clash = self.routes.keys().find(|existing| {
                parse_path(existing).is_ok_and(|other| conflicts(&segments, &other))
            });
            if let Some(existing) = clash {
                return Err(RouteError::Conflict {
                    path: path.to_string(),
                    existing: existing.clone(),
                });
            }
        }
        if !self.registered.insert((method.clone(), path.to_string())) {
            return Err(RouteError::Duplicate {
                method,
                path: path.to_string(),
            });
        }

        let translator = self.translator;
        let body_limit = self.body_limit;
        let endpoint = move |request: Request<Body>| {
            let handler = handler.clone();
            async move { invoke(handler, request, translator, body_limit).await }
        };

        let method_router = match self.routes.remove(path) {
            Some(existing) => existing.on(filter, endpoint),
            None => on(filter, endpoint),
        };
        self.routes.insert(path.to_string(), method_router);

        tracing::debug!(method = %method, path = %path, "Gateway route registered");
        Ok(self)
    }

    pub fn get<Req, Resp, E, F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        E: Into<CallError> + Send + 'static,
        F: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        self.handle(Method::GET, path, handler)
    }

    pub fn post<Req, Resp, E, F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        E: Into<CallError> + Send + 'static,
        F: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        self.handle(Method::POST, path, handler)
    }

    pub fn put<Req, Resp, E, F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        E: Into<CallError> + Send + 'static,
        F: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        self.handle(Method::PUT, path, handler)
    }

    pub fn patch<Req, Resp, E, F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        E: Into<CallError> + Send + 'static,
        F: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        self.handle(Method::PATCH, path, handler)
    }

    pub fn delete<Req, Resp, E, F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        E: Into<CallError> + Send + 'static,
        F: Fn(Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    {
        self.handle(Method::DELETE, path, handler)
    }

    /// Number of registered method/path pairs.
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Build the axum router. Unknown paths and methods answer with the error envelope.
    pub fn into_router(self) -> Router {
        let translator = self.translator;
        let mut router = Router::new();
        for (path, method_router) in self.routes {
            let method_router = method_router.fallback(move || async move {
                translator.respond(
                    StatusCode::METHOD_NOT_ALLOWED,
                    &Status::unimplemented("Method Not Allowed"),
                )
            });
            router = router.route(&path, method_router);
        }
        router.fallback(move || async move {
            translator.translate_status(&Status::not_found("Not Found"))
        })
    }
}

async fn invoke<Req, Resp, E, F, Fut>(
    handler: F,
    request: Request<Body>,
    translator: ErrorTranslator,
    body_limit: usize,
) -> Response
where
    Req: DeserializeOwned,
    Resp: Serialize,
    E: Into<CallError>,
    F: Fn(Req) -> Fut,
    Fut: Future<Output = Result<Resp, E>>,
{
    let message = match decode_request::<Req>(request, body_limit).await {
        Ok(message) => message,
        Err(status) => return translator.translate_status(&status),
    };

    match handler(message).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => translator.translate(&err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize)]
    struct GetOrder {
        id: u64,
    }

    #[derive(Debug, Serialize)]
    struct Order {
        id: u64,
        item: &'static str,
    }

    async fn get_order(req: GetOrder) -> Result<Order, Status> {
        if req.id == 7 {
            Ok(Order { id: 7, item: "widget" })
        } else {
            Err(Status::not_found(format!("order {} not found", req.id)))
        }
    }

    async fn call(router: Router, request: axum::http::Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn success_is_plain_json() {
        let mut gateway = GatewayRouter::default();
        gateway.get("/v1/order", get_order).unwrap();

        let (status, body) = call(gateway.into_router(), get("/v1/order?id=7")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"id": 7, "item": "widget"}));
    }

    #[tokio::test]
    async fn rpc_error_is_envelope() {
        let mut gateway = GatewayRouter::default();
        gateway.get("/v1/order", get_order).unwrap();

        let (status, body) = call(gateway.into_router(), get("/v1/order?id=8")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errcode"], 10000);
        assert_eq!(body["message"], "order 8 not found");
        assert_eq!(body["errDetail"], "order 8 not found");
    }

    #[tokio::test]
    async fn decode_failure_is_bad_request() {
        let mut gateway = GatewayRouter::default();
        gateway.get("/v1/order", get_order).unwrap();

        let (status, body) = call(gateway.into_router(), get("/v1/order?id=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errcode"], 10000);
    }

    #[tokio::test]
    async fn untyped_error_is_sentinel() {
        let mut gateway = GatewayRouter::default();
        gateway
            .post("/v1/fail", |_: serde_json::Value| async {
                Err::<(), _>(crate::error::BoxError::from("disk full"))
            })
            .unwrap();

        let request = axum::http::Request::post("/v1/fail")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(gateway.into_router(), request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Unknown");
        assert!(body.get("errDetail").is_none());
    }

    #[tokio::test]
    async fn unknown_path_and_method_use_envelope() {
        let mut gateway = GatewayRouter::new(&GatewayConfig {
            errcode: 500_001,
            ..GatewayConfig::default()
        });
        gateway.get("/v1/order", get_order).unwrap();
        let router = gateway.into_router();

        let (status, body) = call(router.clone(), get("/v1/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errcode"], 500_001);
        assert_eq!(body["message"], "Not Found");

        let request = axum::http::Request::post("/v1/order")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(router, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["message"], "Method Not Allowed");
    }

    #[test]
    fn rejects_duplicates_and_bad_paths() {
        let mut gateway = GatewayRouter::default();
        gateway.get("/v1/order", get_order).unwrap();
        gateway
            .delete("/v1/order", get_order)
            .expect("different method on same path");

        let err = gateway.get("/v1/order", get_order).unwrap_err();
        assert_eq!(
            err,
            RouteError::Duplicate {
                method: Method::GET,
                path: "/v1/order".into()
            }
        );

        let err = gateway.get("v1/order", get_order).unwrap_err();
        assert!(matches!(err, RouteError::InvalidPath { .. }));
        assert_eq!(gateway.len(), 2);
    }

    #[test]
    fn rejects_old_style_and_malformed_captures() {
        let mut gateway = GatewayRouter::default();
        for path in [
            "/v1/orders/:id",
            "/v1/files/*rest",
            "/v1/orders/{}",
            "/v1/orders/id-{id}",
            "/v1/orders/{id",
            "/v1/files/{*rest}/meta",
        ] {
            let err = gateway.get(path, get_order).unwrap_err();
            assert!(
                matches!(&err, RouteError::InvalidPath { path: p, .. } if p == path),
                "{path}: {err}"
            );
        }
        assert!(gateway.is_empty());
    }

    #[test]
    fn rejects_conflicting_captures() {
        let mut gateway = GatewayRouter::default();
        gateway.get("/v1/orders/{id}", get_order).unwrap();
        gateway.post("/v1/orders/{id}", get_order).unwrap();
        gateway.get("/v1/orders/latest", get_order).unwrap();
        gateway.get("/v1/orders/{id}/items", get_order).unwrap();

        let err = gateway.delete("/v1/orders/{name}", get_order).unwrap_err();
        assert_eq!(
            err,
            RouteError::Conflict {
                path: "/v1/orders/{name}".into(),
                existing: "/v1/orders/{id}".into(),
            }
        );
        assert!(gateway.get("/v1/orders/{*rest}", get_order).is_err());
        assert_eq!(gateway.len(), 4);

        // Every accepted route still builds.
        let _ = gateway.into_router();
    }

    #[tokio::test]
    async fn capture_routes_dispatch() {
        let mut gateway = GatewayRouter::default();
        gateway.get("/v1/orders/{id}", get_order).unwrap();
        gateway.get("/v1/files/{*rest}", get_order).unwrap();
        let router = gateway.into_router();

        let (status, _) = call(router.clone(), get("/v1/orders/7?id=7")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(router, get("/v1/files/a/b?id=7")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
