use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntGauge;
use prometheus::Registry;
use prometheus::TextEncoder;

lazy_static! {
    pub static ref CLUSTERS_STARTED: IntCounter = IntCounter::new(
        "harness_clusters_started",
        "Number of mini-clusters started by this process"
    )
    .expect("metric can not be created");

    pub static ref JOBS_FINISHED: IntCounter = IntCounter::new(
        "harness_jobs_finished",
        "Number of jobs that ran to completion on a mini-cluster"
    )
    .expect("metric can not be created");

    pub static ref ACTIVE_WORKERS: IntGauge = IntGauge::new(
        "harness_active_workers",
        "Task-manager workers currently running across all clusters"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_METRICS: Once = Once::new();

/// Registers the harness collectors exactly once; clusters start and stop
/// repeatedly within one test process, so registration must be idempotent.
pub fn register_custom_metrics() {
    REGISTER_METRICS.call_once(|| {
        REGISTRY
            .register(Box::new(CLUSTERS_STARTED.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(JOBS_FINISHED.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(ACTIVE_WORKERS.clone()))
            .expect("collector can be registered");
    });
}

/// Export metrics for Prometheus to scrape
pub fn gather_metrics_body() -> String {
    let encoder = TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        eprintln!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_metrics_body_contains_registered_collectors() {
        register_custom_metrics();
        CLUSTERS_STARTED.inc();

        let body = gather_metrics_body();
        assert!(body.contains("harness_clusters_started"));
    }

    #[test]
    fn register_custom_metrics_is_idempotent() {
        register_custom_metrics();
        register_custom_metrics();
    }
}
