//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use hulk_boot::{LifecycleSupervisor, RunState, ServiceConfig, ServiceError};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// A config listening on loopback.
pub fn config(rpc_port: i64, http_port: i64) -> ServiceConfig {
    ServiceConfig {
        name: "integration".into(),
        host: "127.0.0.1".into(),
        rpc_port,
        http_port,
        ..Default::default()
    }
}

/// Whether something accepts TCP connections on `127.0.0.1:port`.
pub async fn is_listening(port: u16) -> bool {
    TcpStream::connect(("127.0.0.1", port)).await.is_ok()
}

/// Poll until `port` stops accepting connections or `limit` passes.
pub async fn wait_closed(port: u16, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if !is_listening(port).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// HTTP client without pooling or proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// A supervisor running in the background, stopped through a test-controlled interrupt.
pub struct RunningService {
    pub states: watch::Receiver<RunState>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), ServiceError>>,
}

impl RunningService {
    /// Spawn `supervisor` and wait until it is running.
    pub async fn start(supervisor: LifecycleSupervisor) -> Self {
        let mut states = supervisor.subscribe_state();
        let (stop, interrupted) = oneshot::channel::<()>();
        let task = tokio::spawn(supervisor.run_until(async {
            let _ = interrupted.await;
        }));

        tokio::time::timeout(
            Duration::from_secs(5),
            states.wait_for(|s| *s == RunState::Running),
        )
        .await
        .expect("service did not reach Running")
        .expect("state channel closed");

        Self {
            states,
            stop: Some(stop),
            task,
        }
    }

    /// Deliver the interrupt and wait for the run result.
    pub async fn stop(mut self) -> Result<(), ServiceError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.expect("supervisor task panicked")
    }

    /// Wait for the run to end on its own.
    pub async fn join(self) -> Result<(), ServiceError> {
        self.task.await.expect("supervisor task panicked")
    }
}
