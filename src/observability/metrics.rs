//! Metrics collection and exposition.
//!
//! # Metrics
//! - `supervisor_signals_total` (counter): signals received by kind
//! - `supervisor_reloads_total` (counter): reload attempts by outcome
//! - `supervisor_instances_started_total` (counter)
//! - `supervisor_instances_stopped_total` (counter)
//! - `supervisor_running_instances` (gauge): 0 or 1
//! - `supervisor_stop_duration_seconds` (histogram): time spent stopping
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus endpoint is optional and process-wide, not per instance

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::signals::SignalEvent;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn record_signal(event: SignalEvent) {
    counter!("supervisor_signals_total", "kind" => event.as_str()).increment(1);
}

/// `outcome` is `applied` or `rejected`.
pub fn record_reload(outcome: &'static str) {
    counter!("supervisor_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_instance_started() {
    counter!("supervisor_instances_started_total").increment(1);
    gauge!("supervisor_running_instances").increment(1.0);
}

pub fn record_instance_stopped(elapsed: Duration) {
    counter!("supervisor_instances_stopped_total").increment(1);
    gauge!("supervisor_running_instances").decrement(1.0);
    histogram!("supervisor_stop_duration_seconds").record(elapsed.as_secs_f64());
}
