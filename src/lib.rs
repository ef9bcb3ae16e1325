//! Dual-protocol service bootstrap.
//!
//! Starts an RPC listener and, optionally, an HTTP/JSON gateway in front of it,
//! supervises both, and shuts them down in order.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                 LifecycleSupervisor                  │
//!                 │                                                      │
//!   attach_rpc ───┼─▶ RoutesBuilder ──▶ RpcListener ────┐                │
//!                 │                      (grpc.port)    │ errors         │
//! attach_gateway ─┼─▶ GatewayRouter ──▶ GatewayTranslator ─▶ error slot ─┼─▶ run() result
//!                 │                      (http.port)                     │
//!   ctrl-c ───────┼─────────────────────────────────────▶ shutdown       │
//!                 │                                                      │
//!                 │  ┌────────────────────────────────────────────────┐ │
//!                 │  │  config · net · observability (logs, metrics)  │ │
//!                 │  └────────────────────────────────────────────────┘ │
//!                 └──────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;

pub use config::{load_config, ConfigSource, ServiceConfig, TomlConfig};
pub use error::{BoxError, ErrorRecord, ErrorSource, ServiceError};
pub use http::{CallError, GatewayRouter, RouteError};
pub use lifecycle::{LifecycleSupervisor, RegistrationHooks, RunState, ServiceBuilder};
pub use rpc::RpcServerHandle;
