//! Listener task ownership and ordered shutdown.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{dispatcher, Instrument};

use super::error_slot::ErrorReporter;
use crate::error::{ErrorRecord, ErrorSource, ServiceError};

struct ListenerHandle {
    source: ErrorSource,
    token: CancellationToken,
    task: JoinHandle<()>,
    drain: Option<Duration>,
}

/// The running listener tasks of one service run.
///
/// Shutdown is ordered: gateway listeners drain first (bounded), then the rest.
/// Dropping the set before [`ListenerSet::shutdown`] finishes cancels every token and
/// aborts every task.
pub struct ListenerSet {
    root: CancellationToken,
    reporter: ErrorReporter,
    listeners: Vec<ListenerHandle>,
    drained: bool,
}

impl ListenerSet {
    pub fn new(root: CancellationToken, reporter: ErrorReporter) -> Self {
        Self {
            root,
            reporter,
            listeners: Vec::new(),
            drained: false,
        }
    }

    /// Spawn a listener task.
    ///
    /// `serve` receives a child token and must return once it is cancelled. An
    /// error, a panic, or an `Ok` return before cancellation is reported through the
    /// error slot. `drain` bounds how long shutdown waits for the task; `None` waits
    /// forever.
    pub fn spawn<F, Fut>(&mut self, source: ErrorSource, drain: Option<Duration>, serve: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
    {
        let token = self.root.child_token();
        let watched = token.clone();
        let reporter = self.reporter.clone();
        let serving = serve(token.clone());

        let task = async move {
            let error = match AssertUnwindSafe(serving).catch_unwind().await {
                Ok(Ok(())) if watched.is_cancelled() => {
                    tracing::debug!(listener = %source, "Listener stopped");
                    return;
                }
                Ok(Ok(())) => ServiceError::serve(source, "serve loop exited before shutdown"),
                Ok(Err(e)) => e,
                Err(panic) => ServiceError::serve(source, panic_message(panic.as_ref())),
            };
            reporter.report(ErrorRecord::new(source, error));
        };

        let dispatch = dispatcher::get_default(|d| d.clone());
        let task = tokio::spawn(task.in_current_span().with_subscriber(dispatch));
        tracing::debug!(listener = %source, ?drain, "Listener spawned");

        self.listeners.push(ListenerHandle {
            source,
            token,
            task,
            drain,
        });
    }

    pub fn is_running(&self, source: ErrorSource) -> bool {
        self.listeners
            .iter()
            .any(|h| h.source == source && !h.task.is_finished())
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Drain every listener: gateway first, then RPC, then cancel the root token.
    ///
    /// Returns the shutdown problems, already logged.
    pub async fn shutdown(mut self) -> Vec<ErrorRecord> {
        let (gateways, others): (Vec<_>, Vec<_>) = std::mem::take(&mut self.listeners)
            .into_iter()
            .partition(|h| h.source == ErrorSource::Gateway);

        let mut problems = Vec::new();
        for handle in gateways.into_iter().chain(others) {
            if let Some(problem) = drain(handle).await {
                problem.log();
                problems.push(problem);
            }
        }

        self.root.cancel();
        self.drained = true;
        tracing::info!(problems = problems.len(), "All listeners stopped");
        problems
    }
}

impl Drop for ListenerSet {
    fn drop(&mut self) {
        if self.drained {
            return;
        }
        self.root.cancel();
        for handle in &self.listeners {
            handle.task.abort();
        }
    }
}

async fn drain(handle: ListenerHandle) -> Option<ErrorRecord> {
    let ListenerHandle {
        source,
        token,
        mut task,
        drain,
    } = handle;

    tracing::info!(listener = %source, ?drain, "Draining listener");
    token.cancel();

    let joined = match drain {
        Some(limit) => match tokio::time::timeout(limit, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                task.abort();
                return Some(ErrorRecord::new(
                    ErrorSource::Shutdown,
                    ServiceError::Shutdown(format!(
                        "{source} listener did not drain within {}ms; forced close",
                        limit.as_millis()
                    )),
                ));
            }
        },
        None => task.await,
    };

    match joined {
        Ok(()) => None,
        Err(e) if e.is_cancelled() => None,
        Err(e) => Some(ErrorRecord::new(
            ErrorSource::Shutdown,
            ServiceError::Shutdown(format!("{source} listener task failed: {e}")),
        )),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
