//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bootgate_probe_attempts_total` (counter): probe attempts by result
//! - `bootgate_migration_steps_applied_total` (counter): committed steps
//! - `bootgate_boot_stage` (gauge): current BootState ordinal (3 = failed)
//! - `bootgate_stage_duration_seconds` (histogram): time spent per stage
//! - `bootgate_ready` (gauge): 1=ready, 0=not ready
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op without an exporter
//! - Prometheus exporter only when enabled in config

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::dependency::ProbeResult;
use crate::lifecycle::state::{BootState, Stage};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_probe(result: &ProbeResult) {
    metrics::counter!("bootgate_probe_attempts_total", "result" => result.label()).increment(1);
}

pub fn record_migration_step() {
    metrics::counter!("bootgate_migration_steps_applied_total").increment(1);
}

pub fn record_state(state: &BootState) {
    metrics::gauge!("bootgate_boot_stage").set(f64::from(state.ordinal()));
}

pub fn record_stage_duration(stage: Stage, elapsed: Duration) {
    metrics::histogram!("bootgate_stage_duration_seconds", "stage" => stage.as_str())
        .record(elapsed.as_secs_f64());
}

pub fn record_ready(ready: bool) {
    metrics::gauge!("bootgate_ready").set(if ready { 1.0 } else { 0.0 });
}
