//! Structured logging.
//!
//! # Responsibilities
//! - Build the log sink for a service as a `tracing::Dispatch`
//! - Install it as the process default when running the binary
//!
//! # Design Decisions
//! - JSON format for production (`app.env = "prod"`), pretty format otherwise
//! - `RUST_LOG` overrides the configured level
//! - Database events use `target: "db"` so sinks can route them separately

use tracing::Dispatch;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Target used for database events.
pub const DB_TARGET: &str = "db";

/// Build a dispatch writing to stdout.
pub fn build_dispatch(level: &str, json: bool) -> Dispatch {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer);
    Dispatch::new(subscriber)
}

/// Build a dispatch and make it the process default.
///
/// Returns the dispatch so it can also be injected into services explicitly.
pub fn init(level: &str, json: bool) -> Dispatch {
    let dispatch = build_dispatch(level, json);
    if tracing::dispatcher::set_global_default(dispatch.clone()).is_err() {
        tracing::warn!("Global logger already installed; keeping the existing one");
    }
    dispatch
}
