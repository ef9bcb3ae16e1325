//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceConfig
//!     → listener.rs (resolve port, reject zero)
//!     → listener.rs (bind "<host>:<port>")
//!     → server.rs (accept loop, per-connection tasks, graceful / forced close)
//! ```
//!
//! # Design Decisions
//! - Every socket is bound before any listener task is spawned
//! - No retry: a failed bind is fatal for the run

pub mod listener;
pub mod server;

pub use listener::{bind, listen_address, resolve_port, PortRole};
pub use server::serve_router;
