//! Observability utilities for maintenance jobs.
//!
//! This crate provides:
//! - Prometheus metrics recording and export
//! - Custom metrics for embedding cleanup runs
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, CleanupMetrics};
//!
//! // Initialize metrics recorder
//! init_metrics();
//!
//! // Record a finished cleanup run
//! CleanupMetrics::record_run("execute", "SUCCESS", 1015, 10, 5, 15, 0, 1200);
//! ```

pub mod cleanup;

pub use cleanup::CleanupMetrics;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// This should be called once at application startup.
/// Returns the PrometheusHandle for rendering metrics.
pub fn init_metrics() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        info!("Prometheus metrics recorder initialized");

        // Register metric descriptions
        register_metric_descriptions();

        handle
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Render the current metrics in Prometheus text format
pub fn render_metrics() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use metrics::describe_counter;
    use metrics::describe_histogram;

    describe_counter!(
        "cleanup_runs_total",
        "Total cleanup runs by mode and terminal status"
    );
    describe_counter!(
        "cleanup_embeddings_scanned_total",
        "Total embedding rows examined during cleanup scans"
    );
    describe_counter!(
        "cleanup_orphans_detected_total",
        "Orphan embeddings detected, by reason"
    );
    describe_counter!(
        "cleanup_embeddings_deleted_total",
        "Embedding rows deleted by cleanup runs"
    );
    describe_counter!(
        "cleanup_batches_failed_total",
        "Delete batches that failed and were skipped"
    );
    describe_histogram!(
        "cleanup_run_duration_seconds",
        "Wall-clock duration of a cleanup run"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_before_init() {
        // Rendering without initialization must not panic
        let rendered = render_metrics();
        assert!(rendered.contains("Metrics") || rendered.contains("cleanup"));
    }
}
