//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter, serves the /metrics body and records
//! the service's domain counters.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// This must be called once at startup before any metrics are recorded.
/// Panics if called more than once.
pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

/// One processed upload, by document kind and outcome (`ok`, `rejected`, `failed`).
pub fn record_document(kind: &str, outcome: &'static str) {
    counter!(
        "docproc_documents_processed_total",
        "kind" => kind.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// One upstream Gemini call.
pub fn record_gemini_call(outcome: &'static str, elapsed: Duration) {
    counter!("gemini_requests_total", "outcome" => outcome).increment(1);
    histogram!("gemini_request_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

pub fn record_gemini_tokens(input_tokens: i32, output_tokens: i32) {
    counter!("gemini_tokens_total", "direction" => "input")
        .increment(input_tokens.max(0) as u64);
    counter!("gemini_tokens_total", "direction" => "output")
        .increment(output_tokens.max(0) as u64);
}
