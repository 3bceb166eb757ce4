//! Metrics for orphan embedding cleanup runs.

use metrics::{counter, histogram};

/// Cleanup metrics recorder
pub struct CleanupMetrics;

impl CleanupMetrics {
    /// Record a finished cleanup run.
    ///
    /// Called once per invocation, after the run has reached a terminal
    /// status. Labels carry the wire forms of mode and status so dashboards
    /// can alert on `PARTIAL`/`FAILED` without parsing log output.
    #[allow(clippy::too_many_arguments)]
    pub fn record_run(
        mode: &str,
        status: &str,
        scanned: u64,
        missing_parent: u64,
        parent_deleted: u64,
        deleted: u64,
        failed_batches: u64,
        duration_ms: u64,
    ) {
        counter!(
            "cleanup_runs_total",
            "mode" => mode.to_string(),
            "status" => status.to_string()
        )
        .increment(1);

        counter!("cleanup_embeddings_scanned_total").increment(scanned);
        counter!("cleanup_orphans_detected_total", "reason" => "MISSING_PARENT")
            .increment(missing_parent);
        counter!("cleanup_orphans_detected_total", "reason" => "PARENT_DELETED")
            .increment(parent_deleted);
        counter!("cleanup_embeddings_deleted_total").increment(deleted);
        counter!("cleanup_batches_failed_total").increment(failed_batches);
        histogram!("cleanup_run_duration_seconds", "mode" => mode.to_string())
            .record(duration_ms as f64 / 1000.0);

        tracing::debug!(
            mode = mode,
            status = status,
            scanned = scanned,
            deleted = deleted,
            duration_ms = duration_ms,
            "Recorded cleanup run metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_run_without_recorder() {
        // Recording with no global recorder installed is a no-op, not a panic
        CleanupMetrics::record_run("dry-run", "SUCCESS", 100, 1, 2, 0, 0, 50);
    }
}
