//! RPC listener subsystem.
//!
//! # Data Flow
//! ```text
//! attach_rpc hook → RoutesBuilder → Routes
//!     → server.rs (tonic Server over the bound TcpListener)
//!     → graceful stop on token cancellation
//! ```

pub mod server;

pub use server::{RpcListener, RpcServerHandle};
