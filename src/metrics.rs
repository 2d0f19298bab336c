use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already installed.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("calls_emitted_total", "Call records emitted.");
        describe_counter!("calls_dropped_total", "Emitted call records marked dropped.");
        describe_counter!(
            "calls_forced_drop_total",
            "Calls dropped because the active-call ceiling was reached."
        );
        describe_counter!("calls_ended_total", "Active calls ended by the termination ticker.");
        describe_gauge!("active_calls", "Currently active calls.");
        describe_counter!("alerts_emitted_total", "Drop-rate alerts emitted by window shards.");
        describe_counter!("forward_submitted_total", "Records handed to the secondary store.");
        describe_counter!("forward_success_total", "Secondary store writes that succeeded.");
        describe_counter!("forward_timeout_total", "Secondary store writes that timed out.");
        describe_counter!("forward_failure_total", "Secondary store writes that failed.");
        describe_gauge!("forward_in_flight", "Outstanding secondary store writes.");
        describe_histogram!("forward_latency_ms", "Secondary store write latency in milliseconds.");
    });
}
