use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::corpus::BatchStats;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once per process (the service binary).
    pub fn init() -> anyhow::Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_metrics_described();
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
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("headlines_classified_total", "Headlines classified.");
        describe_counter!(
            "headlines_unknown_disease_total",
            "Headlines with no recognized disease."
        );
        describe_counter!(
            "headlines_unknown_region_total",
            "Headlines with no recognized place."
        );
        describe_counter!("headlines_undated_total", "Headlines with no temporal signal.");
        describe_counter!(
            "headline_source_errors_total",
            "Headline sources that could not be read."
        );
        describe_histogram!("classify_batch_ms", "Batch classification time in milliseconds.");
    });
}

/// Record one classified batch. No-op until a recorder is installed.
pub fn record_batch(stats: &BatchStats, elapsed_ms: f64) {
    counter!("headlines_classified_total").increment(stats.total as u64);
    counter!("headlines_unknown_disease_total").increment(stats.unknown_disease as u64);
    counter!("headlines_unknown_region_total").increment(stats.unknown_region as u64);
    counter!("headlines_undated_total").increment(stats.undated as u64);
    histogram!("classify_batch_ms").record(elapsed_ms);
}

pub fn record_source_error(source: &'static str) {
    counter!("headline_source_errors_total", "source" => source).increment(1);
}
