use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CleanupResult;
use crate::models::{DocumentState, EmbeddingRef};

/// Store accessor for the document and embedding tables.
///
/// Owns the typed queries (count, scan, resolve, delete) and nothing else;
/// classification and batching live above it. The trait seam exists so the
/// detector and executor can be tested against a mock without a database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Documents currently in the store (includes soft-deleted rows)
    async fn count_documents(&self) -> CleanupResult<u64>;

    /// Embedding rows currently in the store
    async fn count_embeddings(&self) -> CleanupResult<u64>;

    /// One keyset page of (embedding id, parent document id) pairs, ordered
    /// by embedding id, strictly after `cursor`. Never fetches the vector
    /// payload. An empty page means the scan is complete.
    async fn embedding_refs_after(
        &self,
        cursor: Option<Uuid>,
        limit: u64,
    ) -> CleanupResult<Vec<EmbeddingRef>>;

    /// Resolve a batch of document ids in one round trip.
    ///
    /// Returns one `DocumentState` per id that has a row, soft-deleted rows
    /// included; ids with no row are simply absent from the result. Returning
    /// the deletion marker here is what lets the caller tell MISSING_PARENT
    /// from PARENT_DELETED without a second query.
    async fn document_states(&self, ids: &[Uuid]) -> CleanupResult<Vec<DocumentState>>;

    /// Delete embeddings by id inside a single transaction.
    ///
    /// Returns the number of rows actually deleted, which may be less than
    /// `ids.len()` if a concurrent run got there first; the caller treats a
    /// mismatch as noteworthy, not fatal.
    async fn delete_embeddings(&self, ids: &[Uuid]) -> CleanupResult<u64>;
}
