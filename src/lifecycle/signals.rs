//! OS signal handling.
//!
//! Only the interrupt signal (Ctrl+C / SIGINT) is observed; it triggers the same
//! shutdown path as a listener failure.

/// Resolve when the process receives an interrupt.
///
/// If the handler cannot be installed the future never resolves, leaving
/// listener failures as the only shutdown trigger.
pub async fn interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Interrupt signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install interrupt handler");
            std::future::pending::<()>().await;
        }
    }
}
