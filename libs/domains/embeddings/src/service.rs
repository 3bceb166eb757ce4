use chrono::Utc;
use futures::{StreamExt, pin_mut};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use strum::Display;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::detector::{OrphanDetector, orphan_reason};
use crate::error::CleanupResult;
use crate::models::{
    BatchFailure, CleanupMode, CleanupOptions, CleanupOutcome, DocumentState, OrphanRecord,
    RunStatus,
};
use crate::repository::EmbeddingStore;

/// Cooperative cancellation signal for a running cleanup.
///
/// The flag is only polled between batches, so an in-flight delete
/// transaction always finishes; a half-applied batch is never possible.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executor phases, logged at each transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
enum RunPhase {
    Init,
    Scanning,
    DryRunReporting,
    Deleting,
    Done,
    Failed,
}

/// Drives a full cleanup run: scan, classify, batch, delete, summarize.
///
/// A batch-level delete failure is recorded and the run continues; only
/// connection-level and scan-level errors stop the run. Running twice with
/// no intervening writes deletes nothing the second time.
pub struct CleanupService<S: EmbeddingStore> {
    store: Arc<S>,
    options: CleanupOptions,
}

impl<S: EmbeddingStore> CleanupService<S> {
    pub fn new(store: S, options: CleanupOptions) -> Self {
        Self {
            store: Arc::new(store),
            options,
        }
    }

    pub fn options(&self) -> &CleanupOptions {
        &self.options
    }

    /// Run one cleanup invocation to a terminal outcome.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// outcome's status and counts so the caller always has one report
    /// to emit.
    pub async fn run(&self, mode: CleanupMode, cancel: CancelFlag) -> CleanupOutcome {
        let mut outcome = CleanupOutcome::start(mode);
        let deadline = self.options.max_runtime.map(|budget| Instant::now() + budget);

        self.enter(RunPhase::Init);
        info!(
            mode = %mode,
            scan_batch_size = self.options.scan_batch_size,
            delete_batch_size = self.options.delete_batch_size,
            grace_period_hours = self.options.grace_period_hours,
            "Starting orphan embedding cleanup"
        );

        // Front counts establish scale; a failure here is the
        // connection-error path and aborts before any scanning
        match self.front_counts().await {
            Ok((documents, embeddings)) => {
                outcome.documents_total = documents;
                outcome.embeddings_before = embeddings;
            }
            Err(e) => {
                error!(error = %e, "Cleanup failed before scanning");
                outcome.error = Some(e.to_string());
                outcome.finish(RunStatus::Failed);
                self.enter(RunPhase::Failed);
                return outcome;
            }
        }

        // Scan the embeddings table and collect orphans into delete-sized
        // batches. The page stream is lazy; only orphans are materialized.
        self.enter(RunPhase::Scanning);
        let detector = OrphanDetector::new(self.store.clone(), &self.options);
        let mut batches: Vec<Vec<OrphanRecord>> = Vec::new();
        let mut pending: Vec<OrphanRecord> = Vec::new();

        {
            let stream = detector.pages();
            pin_mut!(stream);

            loop {
                if cancel.is_cancelled() || past_deadline(deadline) {
                    warn!(scanned = outcome.scanned, "Cleanup interrupted during scan");
                    outcome.truncated = true;
                    break;
                }

                let Some(page) = stream.next().await else {
                    break;
                };

                match page {
                    Ok(page) => {
                        outcome.scanned += page.examined;
                        for orphan in page.orphans {
                            outcome.record_orphan(&orphan);
                            if mode.is_dry_run() {
                                continue;
                            }
                            pending.push(orphan);
                            if pending.len() >= self.options.delete_batch_size {
                                batches.push(std::mem::take(&mut pending));
                            }
                        }
                    }
                    Err(e) => {
                        error!(error = %e, scanned = outcome.scanned, "Scan failed; aborting run");
                        outcome.error = Some(e.to_string());
                        outcome.finish(RunStatus::Failed);
                        self.enter(RunPhase::Failed);
                        return outcome;
                    }
                }
            }
        }

        if !pending.is_empty() {
            batches.push(pending);
        }

        if mode.is_dry_run() {
            self.enter(RunPhase::DryRunReporting);
            info!(
                scanned = outcome.scanned,
                orphans = outcome.orphans_total(),
                missing_parent = outcome.missing_parent,
                parent_deleted = outcome.parent_deleted,
                "Dry run complete; no rows deleted"
            );
        } else {
            self.enter(RunPhase::Deleting);
            for (index, batch) in batches.into_iter().enumerate() {
                if cancel.is_cancelled() || past_deadline(deadline) {
                    warn!(
                        batches_completed = index,
                        "Cleanup interrupted; no further batches scheduled"
                    );
                    outcome.truncated = true;
                    break;
                }
                self.execute_batch(&mut outcome, index, batch).await;
            }

            match self.store.count_embeddings().await {
                Ok(count) => outcome.embeddings_after = Some(count),
                Err(e) => warn!(error = %e, "Failed to count embeddings after run"),
            }
        }

        let status = if outcome.failed_batches > 0 || outcome.truncated {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };
        outcome.finish(status);
        self.enter(RunPhase::Done);

        info!(
            status = %outcome.status,
            scanned = outcome.scanned,
            orphans = outcome.orphans_total(),
            deleted = outcome.deleted,
            rescued = outcome.rescued,
            failed_batches = outcome.failed_batches,
            duration_ms = outcome.duration_ms,
            "Cleanup run finished"
        );
        outcome
    }

    async fn front_counts(&self) -> CleanupResult<(u64, u64)> {
        let documents = self.store.count_documents().await?;
        let embeddings = self.store.count_embeddings().await?;
        Ok((documents, embeddings))
    }

    /// Re-validate and delete one batch; failures are recorded, never raised
    async fn execute_batch(
        &self,
        outcome: &mut CleanupOutcome,
        index: usize,
        batch: Vec<OrphanRecord>,
    ) {
        let size = batch.len();

        // Re-validation: drop any embedding whose parent was created or
        // undeleted after detection
        let batch = match self.revalidate(batch).await {
            Ok((kept, rescued)) => {
                if rescued > 0 {
                    debug!(batch = index, rescued = rescued, "Rescued re-parented embeddings");
                    outcome.rescued += rescued;
                }
                kept
            }
            Err(e) => {
                warn!(batch = index, error = %e, "Batch re-validation failed; skipping batch");
                outcome.failed_batches += 1;
                outcome.failures.push(BatchFailure {
                    index,
                    first_id: Uuid::nil(),
                    last_id: Uuid::nil(),
                    size,
                    error: e.to_string(),
                });
                return;
            }
        };

        if batch.is_empty() {
            return;
        }

        let ids: Vec<Uuid> = batch.iter().map(|o| o.embedding_id).collect();
        match self.store.delete_embeddings(&ids).await {
            Ok(deleted) => {
                outcome.deleted += deleted;
                if (deleted as usize) < ids.len() {
                    // A concurrent run already removed some rows; harmless
                    debug!(
                        batch = index,
                        requested = ids.len(),
                        deleted = deleted,
                        "Delete count mismatch"
                    );
                }
            }
            Err(e) => {
                let failure = BatchFailure {
                    index,
                    first_id: ids[0],
                    last_id: ids[ids.len() - 1],
                    size: ids.len(),
                    error: e.to_string(),
                };
                warn!(
                    batch = index,
                    first_id = %failure.first_id,
                    last_id = %failure.last_id,
                    error = %e,
                    "Delete batch failed; continuing with next batch"
                );
                outcome.failed_batches += 1;
                outcome.failures.push(failure);
            }
        }
    }

    /// Re-resolve a batch's parents; returns (still orphaned, rescued count)
    async fn revalidate(
        &self,
        batch: Vec<OrphanRecord>,
    ) -> CleanupResult<(Vec<OrphanRecord>, u64)> {
        let parent_ids: Vec<Uuid> = batch
            .iter()
            .map(|o| o.document_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let states = self.store.document_states(&parent_ids).await?;
        let by_id: HashMap<Uuid, DocumentState> =
            states.into_iter().map(|s| (s.id, s)).collect();
        let cutoff = Utc::now() - chrono::Duration::hours(self.options.grace_period_hours);

        let mut kept = Vec::with_capacity(batch.len());
        let mut rescued = 0u64;
        for orphan in batch {
            if orphan_reason(by_id.get(&orphan.document_id), cutoff).is_some() {
                kept.push(orphan);
            } else {
                rescued += 1;
            }
        }

        Ok((kept, rescued))
    }

    fn enter(&self, phase: RunPhase) {
        debug!(phase = %phase, "Cleanup phase transition");
    }
}

fn past_deadline(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
