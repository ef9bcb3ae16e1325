//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor, listeners, gateway produce:
//!     → logging.rs (tracing events, one Dispatch per service)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - No process-wide logger singleton inside the library; each service
//!   carries the Dispatch it logs through
//! - Metrics are cheap (atomic increments) and off until a recorder exists

pub mod logging;
pub mod metrics;
