//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Registration hooks → Resolve ports → Bind sockets
//!
//! Running (supervisor.rs, shutdown.rs):
//!     Spawn listener tasks → wait on error slot (error_slot.rs) or interrupt (signals.rs)
//!
//! Shutdown (shutdown.rs):
//!     Drain gateway (bounded) → Drain RPC (unbounded by default) → Stopped
//! ```
//!
//! # Design Decisions
//! - Hooks complete before any socket is bound; sockets bind before any task spawns
//! - The first listener error wins; later ones are logged and dropped
//! - Shutdown runs once because `run` consumes the supervisor
//! - Dropping a run mid-flight cancels and aborts every listener

pub mod builder;
pub mod error_slot;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;
pub mod supervisor;

pub use builder::ServiceBuilder;
pub use error_slot::{error_slot, ErrorReporter, ErrorSlot};
pub use shutdown::ListenerSet;
pub use startup::{AttachGateway, AttachRpc, RegistrationHooks};
pub use state::{RunState, StateCell};
pub use supervisor::LifecycleSupervisor;
