//! Run summary output and exit-code mapping

use domain_embeddings::{CleanupOutcome, RunStatus};
use std::process::ExitCode;
use tracing::{info, warn};

/// Emit the outcome: one structured summary line for log pipelines, one
/// pretty-printed JSON block on stdout for operators and scripts.
pub fn emit(outcome: &CleanupOutcome) {
    info!(
        mode = %outcome.mode,
        status = %outcome.status,
        documents_total = outcome.documents_total,
        embeddings_before = outcome.embeddings_before,
        embeddings_after = outcome.embeddings_after,
        scanned = outcome.scanned,
        missing_parent = outcome.missing_parent,
        parent_deleted = outcome.parent_deleted,
        deleted = outcome.deleted,
        rescued = outcome.rescued,
        failed_batches = outcome.failed_batches,
        truncated = outcome.truncated,
        duration_ms = outcome.duration_ms,
        "Cleanup run summary"
    );

    for failure in &outcome.failures {
        warn!(
            batch = failure.index,
            first_id = %failure.first_id,
            last_id = %failure.last_id,
            size = failure.size,
            error = %failure.error,
            "Failed delete batch"
        );
    }

    match serde_json::to_string_pretty(outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "Failed to serialize outcome"),
    }
}

/// Map the run status to the process exit code: 0 success, 2 partial, 1 failed
pub fn exit_code(status: RunStatus) -> ExitCode {
    ExitCode::from(status_code(status))
}

fn status_code(status: RunStatus) -> u8 {
    match status {
        RunStatus::Success => 0,
        RunStatus::Partial => 2,
        RunStatus::Failed => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_embeddings::CleanupMode;

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(status_code(RunStatus::Success), 0);
        assert_eq!(status_code(RunStatus::Partial), 2);
        assert_eq!(status_code(RunStatus::Failed), 1);
    }

    #[test]
    fn test_outcome_json_shape() {
        let mut outcome = CleanupOutcome::start(CleanupMode::DryRun);
        outcome.scanned = 42;
        outcome.finish(RunStatus::Success);

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string_pretty(&outcome).unwrap()).unwrap();
        assert_eq!(json["mode"], "dry-run");
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["scanned"], 42);
        assert!(json["ended_at"].is_string());
    }
}
