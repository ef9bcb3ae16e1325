//! Single-slot error delivery.
//!
//! Any number of listener tasks hold an [`ErrorReporter`]; the supervisor holds the
//! [`ErrorSlot`]. The first report is delivered. Every later report is logged and
//! dropped. Reporting never blocks.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::error::ErrorRecord;
use crate::observability::metrics;

/// Create a connected reporter/slot pair.
pub fn error_slot() -> (ErrorReporter, ErrorSlot) {
    let (tx, rx) = oneshot::channel();
    (
        ErrorReporter {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
        ErrorSlot { rx: Some(rx) },
    )
}

/// Write side; cheap to clone into each listener task.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    tx: Arc<Mutex<Option<oneshot::Sender<ErrorRecord>>>>,
}

impl ErrorReporter {
    /// Offer `record` to the slot. Returns `true` if it was the first.
    pub fn report(&self, record: ErrorRecord) -> bool {
        metrics::record_listener_failure(record.source);

        let sender = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => match tx.send(record) {
                Ok(()) => true,
                Err(record) => {
                    tracing::warn!(
                        source = %record.source,
                        error = %record.error,
                        "Listener error dropped: supervisor is no longer waiting"
                    );
                    false
                }
            },
            None => {
                tracing::warn!(
                    source = %record.source,
                    error = %record.error,
                    "Listener error dropped: an earlier error already triggered shutdown"
                );
                false
            }
        }
    }
}

/// Read side, owned by the supervisor.
#[derive(Debug)]
pub struct ErrorSlot {
    rx: Option<oneshot::Receiver<ErrorRecord>>,
}

impl ErrorSlot {
    /// Wait for the first error.
    ///
    /// Returns `None` once the slot is consumed or every reporter is gone without
    /// reporting.
    pub async fn recv(&mut self) -> Option<ErrorRecord> {
        let rx = self.rx.as_mut()?;
        let record = rx.await.ok();
        self.rx = None;
        record
    }
}
