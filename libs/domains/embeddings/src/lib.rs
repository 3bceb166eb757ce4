//! Orphan embedding detection and cleanup.
//!
//! Embeddings reference their parent document by a plain `document_id`
//! column with no foreign key, so deleted or never-committed documents
//! leave orphaned rows behind. This crate scans the embeddings table in
//! keyset pages, classifies each row against its parent's state, and
//! deletes confirmed orphans in bounded per-transaction batches.
//!
//! The seams mirror the run itself: [`repository::EmbeddingStore`] owns
//! the typed queries, [`detector::OrphanDetector`] owns classification,
//! and [`service::CleanupService`] owns batching, failure isolation, and
//! the final [`models::CleanupOutcome`].

pub mod detector;
pub mod entity;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;

pub use detector::{OrphanDetector, ScanPage};
pub use error::{CleanupError, CleanupResult};
pub use models::{
    BatchFailure, CleanupMode, CleanupOptions, CleanupOutcome, DocumentState, EmbeddingRef,
    OrphanReason, OrphanRecord, RunStatus,
};
pub use postgres::PgEmbeddingStore;
pub use repository::EmbeddingStore;
pub use service::{CancelFlag, CleanupService};
