use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use strum::{Display, EnumString};
use uuid::Uuid;

/// One scan unit: an embedding row and the document it claims as parent.
///
/// The vector payload is never fetched during a scan; only the two
/// identifiers travel through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingRef {
    pub id: Uuid,
    pub document_id: Uuid,
}

/// Parent resolution unit: everything the detector needs to know about a
/// document in one round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentState {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DocumentState {
    /// Whether this document counts as a live parent at `cutoff`.
    ///
    /// A soft-deleted document is still "live" while inside the retention
    /// grace period (deleted_at > cutoff).
    pub fn is_live(&self, cutoff: DateTime<Utc>) -> bool {
        match self.deleted_at {
            None => true,
            Some(deleted_at) => deleted_at > cutoff,
        }
    }
}

/// Why an embedding was classified as an orphan
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrphanReason {
    /// The referenced document row is absent
    MissingParent,
    /// The referenced document exists but is soft-deleted past the grace period
    ParentDeleted,
}

/// An embedding eligible for deletion, derived during a scan and never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrphanRecord {
    pub embedding_id: Uuid,
    pub document_id: Uuid,
    /// Tenant of the parent document. `None` for `MissingParent`: the parent
    /// row is gone, so its collection cannot be resolved.
    pub collection_id: Option<Uuid>,
    pub reason: OrphanReason,
}

/// Dry-run inspects; execute deletes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CleanupMode {
    DryRun,
    #[default]
    Execute,
}

impl CleanupMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, CleanupMode::DryRun)
    }
}

/// Terminal status of a cleanup run
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Every batch succeeded
    Success,
    /// Some batches failed or the run was cancelled/truncated, but committed
    /// deletions stand
    Partial,
    /// A fatal connection or scan error stopped the run
    Failed,
}

/// Tunables for one cleanup invocation
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Rows fetched per keyset page during the scan
    pub scan_batch_size: u64,
    /// Orphans deleted per transaction; deletes are more expensive than reads
    pub delete_batch_size: usize,
    /// Soft-deleted parents younger than this are still treated as live
    pub grace_period_hours: i64,
    /// Wall-clock budget; once exceeded no new delete batches are scheduled
    pub max_runtime: Option<Duration>,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            scan_batch_size: 1000,
            delete_batch_size: 500,
            grace_period_hours: 0,
            max_runtime: None,
        }
    }
}

/// A delete batch that failed and was skipped
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    /// Zero-based batch index within the run
    pub index: usize,
    pub first_id: Uuid,
    pub last_id: Uuid,
    pub size: usize,
    pub error: String,
}

/// The structured outcome of one cleanup invocation.
///
/// Ephemeral: emitted to the operator and to metrics, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupOutcome {
    pub mode: CleanupMode,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    /// Documents in the store when the run started
    pub documents_total: u64,
    /// Embeddings in the store when the run started
    pub embeddings_before: u64,
    /// Embeddings remaining after an execute run (None for dry-run or failure)
    pub embeddings_after: Option<u64>,
    /// Embedding rows examined by the scan
    pub scanned: u64,
    pub missing_parent: u64,
    pub parent_deleted: u64,
    /// Orphans per collection; key "unknown" when the tenant is unresolvable
    pub orphans_by_collection: BTreeMap<String, u64>,
    pub deleted: u64,
    /// Orphans dropped from a delete batch because their parent reappeared
    pub rescued: u64,
    pub failed_batches: u64,
    pub failures: Vec<BatchFailure>,
    /// Whether the run stopped scheduling batches early (cancel or deadline)
    pub truncated: bool,
    /// Fatal error, present when status is FAILED
    pub error: Option<String>,
}

impl CleanupOutcome {
    /// A fresh outcome in the FAILED state; the executor upgrades the status
    /// as the run progresses, so an early bail-out reports honestly.
    pub fn start(mode: CleanupMode) -> Self {
        Self {
            mode,
            status: RunStatus::Failed,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
            documents_total: 0,
            embeddings_before: 0,
            embeddings_after: None,
            scanned: 0,
            missing_parent: 0,
            parent_deleted: 0,
            orphans_by_collection: BTreeMap::new(),
            deleted: 0,
            rescued: 0,
            failed_batches: 0,
            failures: Vec::new(),
            truncated: false,
            error: None,
        }
    }

    /// Tally one detected orphan
    pub fn record_orphan(&mut self, orphan: &OrphanRecord) {
        match orphan.reason {
            OrphanReason::MissingParent => self.missing_parent += 1,
            OrphanReason::ParentDeleted => self.parent_deleted += 1,
        }

        let key = orphan
            .collection_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        *self.orphans_by_collection.entry(key).or_insert(0) += 1;
    }

    pub fn orphans_total(&self) -> u64 {
        self.missing_parent + self.parent_deleted
    }

    /// Stamp the terminal status and close the timing window
    pub fn finish(&mut self, status: RunStatus) {
        let ended = Utc::now();
        self.status = status;
        self.ended_at = Some(ended);
        self.duration_ms = (ended - self.started_at).num_milliseconds().max(0) as u64;
    }
}
