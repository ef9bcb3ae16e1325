//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): gateway responses by method, status
//! - `gateway_request_duration_seconds` (histogram): gateway latency
//! - `service_listener_failures_total` (counter): fatal listener errors by source
//! - `service_run_state` (gauge): current lifecycle state as its ordinal
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ErrorSource;
use crate::lifecycle::RunState;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter started");
    Ok(())
}

pub fn record_gateway_request(method: &str, status: u16, started: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_listener_failure(source: ErrorSource) {
    counter!("service_listener_failures_total", "source" => source.as_str()).increment(1);
}

pub fn record_run_state(state: RunState) {
    gauge!("service_run_state").set(state as u8 as f64);
}
