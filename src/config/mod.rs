//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & parse)
//!     → source.rs (dotted-key accessor: get_int / get_string / get_*_or)
//!     → schema.rs (ServiceConfig snapshot)
//!     → validation.rs (structural checks at build time)
//!     → LifecycleSupervisor (owns the config for one run)
//! ```
//!
//! # Design Decisions
//! - The accessor never fails; missing keys read as zero values
//! - Port values are validated when resolved, so a zero port fails the run
//! - Validation separates syntactic (toml) from semantic checks

pub mod loader;
pub mod schema;
pub mod source;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{GatewayConfig, ServiceConfig, ShutdownConfig};
pub use source::{ConfigSource, TomlConfig};
pub use validation::{validate_config, ValidationError};
