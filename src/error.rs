//! Error taxonomy for the service lifecycle.
//!
//! # Propagation
//! ```text
//! Configuration / Network / Registration  → returned from Run before any task starts
//! Serve (listener task)                   → error slot → returned from Run
//! Shutdown (drain deadline, join failure) → logged only
//! ```

use std::fmt;
use std::time::SystemTime;

use thiserror::Error;

/// Boxed error used at the seams where embedding code supplies the failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal and non-fatal failures of a service run.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing, zero or conflicting configuration values.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A listening socket could not be opened.
    #[error("failed to bind {addr}: {source}")]
    Network {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A listener's serve loop exited abnormally.
    #[error("{listener} listener failed: {source}")]
    Serve {
        listener: ErrorSource,
        #[source]
        source: BoxError,
    },

    /// A registration hook returned an error.
    #[error("registration failed: {0}")]
    Registration(#[source] BoxError),

    /// Drain deadline exceeded or a listener task could not be joined.
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

impl ServiceError {
    pub(crate) fn serve(listener: ErrorSource, source: impl Into<BoxError>) -> Self {
        ServiceError::Serve {
            listener,
            source: source.into(),
        }
    }
}

/// Which part of the service produced an [`ErrorRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSource {
    Rpc,
    Gateway,
    Shutdown,
}

impl ErrorSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSource::Rpc => "rpc",
            ErrorSource::Gateway => "gateway",
            ErrorSource::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error together with where and when it was observed.
#[derive(Debug)]
pub struct ErrorRecord {
    pub source: ErrorSource,
    pub error: ServiceError,
    pub observed_at: SystemTime,
}

impl ErrorRecord {
    pub fn new(source: ErrorSource, error: ServiceError) -> Self {
        Self {
            source,
            error,
            observed_at: SystemTime::now(),
        }
    }

    /// Emit the record at error level.
    pub fn log(&self) {
        let observed_ms = self
            .observed_at
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        tracing::error!(
            source = %self.source,
            observed_at_ms = observed_ms as u64,
            error = %self.error,
            "Service error"
        );
    }
}
