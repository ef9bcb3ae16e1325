//! Connection-owning serve loop shared by the RPC and gateway listeners.
//!
//! # Responsibilities
//! - Accept connections and serve an axum [`Router`] over HTTP/1 and HTTP/2
//! - Stop accepting on cancellation and let open connections finish gracefully
//! - Force-close every open connection when the serve future is dropped
//!
//! # Design Decisions
//! - Connection tasks and HTTP/2 stream tasks run under the caller's span and
//!   subscriber, so per-request events reach the service's logger
//! - Drain deadlines are enforced by the owner of the serve future: dropping it
//!   (for example by aborting its task) is the force-close

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::pin;
use std::time::Duration;

use axum::{body::Body, extract::ConnectInfo, http::Request, Router};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use tracing::instrument::WithSubscriber;
use tracing::{dispatcher, Dispatch, Instrument, Span};

/// Spawns hyper's internal tasks under a fixed span and subscriber.
#[derive(Clone)]
struct TracedExecutor {
    dispatch: Dispatch,
    span: Span,
}

impl<F> hyper::rt::Executor<F> for TracedExecutor
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn execute(&self, fut: F) {
        tokio::spawn(
            fut.instrument(self.span.clone())
                .with_subscriber(self.dispatch.clone()),
        );
    }
}

/// Serve `router` on `listener` until `shutdown` is cancelled, then wait for open
/// connections to finish.
///
/// Dropping the returned future closes every connection it accepted.
pub async fn serve_router(listener: TcpListener, router: Router, shutdown: CancellationToken) {
    let executor = TracedExecutor {
        dispatch: dispatcher::get_default(|d| d.clone()),
        span: Span::current(),
    };
    let connections = TaskTracker::new();
    let closing = CancellationToken::new();
    let _force_close = closing.clone().drop_guard();

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            () = shutdown.cancelled() => break,
        };

        match accepted {
            Ok((stream, remote)) => {
                let connection = serve_connection(
                    stream,
                    remote,
                    router.clone(),
                    executor.clone(),
                    shutdown.clone(),
                    closing.clone(),
                );
                connections.spawn(
                    connection
                        .instrument(executor.span.clone())
                        .with_subscriber(executor.dispatch.clone()),
                );
            }
            Err(e) if is_connection_error(&e) => {}
            Err(e) => {
                tracing::error!(error = %e, "Accept failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    drop(listener);
    connections.close();
    if !connections.is_empty() {
        tracing::debug!(open = connections.len(), "Waiting for open connections");
    }
    connections.wait().await;
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    router: Router,
    executor: TracedExecutor,
    draining: CancellationToken,
    closing: CancellationToken,
) {
    let service = router.map_request(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(remote));
        request.map(Body::new)
    });

    let builder = Builder::new(executor);
    let mut conn = pin!(builder.serve_connection_with_upgrades(
        TokioIo::new(stream),
        TowerToHyperService::new(service),
    ));
    let mut graceful = false;

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::trace!(client = %remote, error = %e, "Connection ended with error");
                }
                break;
            }
            () = draining.cancelled(), if !graceful => {
                graceful = true;
                conn.as_mut().graceful_shutdown();
            }
            () = closing.cancelled() => {
                tracing::debug!(client = %remote, "Connection force-closed");
                break;
            }
        }
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_millis(800)).await;
        "done"
    }

    async fn request(addr: SocketAddr) -> io::Result<String> {
        let mut stream = TcpStream::connect(addr).await?;
        stream
            .write_all(b"GET /slow HTTP/1.1\r\nhost: test\r\n\r\n")
            .await?;
        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        Ok(response)
    }

    #[tokio::test]
    async fn graceful_stop_lets_requests_finish() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve_router(
            listener,
            Router::new().route("/slow", get(slow)),
            shutdown.clone(),
        ));

        let client = tokio::spawn(request(addr));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();

        server.await.unwrap();
        let response = client.await.unwrap().unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("done"));
    }

    #[tokio::test]
    async fn dropping_the_server_closes_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve_router(
            listener,
            Router::new().route("/slow", get(slow)),
            shutdown.clone(),
        ));

        let client = tokio::spawn(request(addr));
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        server.abort();

        let response = client.await.unwrap().unwrap_or_default();
        assert!(!response.contains("done"));
    }
}
