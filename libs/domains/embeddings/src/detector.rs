use async_stream::try_stream;
use chrono::{DateTime, Duration, Utc};
use futures::Stream;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{CleanupError, CleanupResult};
use crate::models::{CleanupOptions, DocumentState, EmbeddingRef, OrphanReason, OrphanRecord};
use crate::repository::EmbeddingStore;

/// One classified page of the scan
#[derive(Debug)]
pub struct ScanPage {
    /// Embedding rows examined in this page
    pub examined: u64,
    pub orphans: Vec<OrphanRecord>,
}

/// Walks the embeddings table in keyset pages and classifies each page
/// against a single batched parent lookup.
///
/// Orphan records are a function of the database state observed at scan
/// time; no locks are taken. The stream is restartable by constructing a
/// new detector, not resumable mid-scan.
pub struct OrphanDetector<S: EmbeddingStore> {
    store: Arc<S>,
    scan_batch_size: u64,
    grace_period: Duration,
}

impl<S: EmbeddingStore> OrphanDetector<S> {
    pub fn new(store: Arc<S>, options: &CleanupOptions) -> Self {
        Self {
            store,
            scan_batch_size: options.scan_batch_size.max(1),
            grace_period: Duration::hours(options.grace_period_hours),
        }
    }

    /// The lazy page stream. Bounded by table size; never materializes the
    /// full embeddings table. A page-level query error ends the stream and
    /// is fatal from that point forward.
    pub fn pages(&self) -> impl Stream<Item = CleanupResult<ScanPage>> + '_ {
        try_stream! {
            let mut cursor: Option<Uuid> = None;

            loop {
                let refs = self
                    .store
                    .embedding_refs_after(cursor, self.scan_batch_size)
                    .await
                    .map_err(as_scan_error)?;

                if refs.is_empty() {
                    break;
                }

                cursor = refs.last().map(|r| r.id);
                let short_page = (refs.len() as u64) < self.scan_batch_size;

                let page = self.classify(refs).await?;
                yield page;

                if short_page {
                    break;
                }
            }
        }
    }

    /// Resolve one page's parents in a single round trip and classify
    async fn classify(&self, refs: Vec<EmbeddingRef>) -> CleanupResult<ScanPage> {
        // Dedupe parent ids; many chunks share one document
        let parent_ids: Vec<Uuid> = refs
            .iter()
            .map(|r| r.document_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let states = self
            .store
            .document_states(&parent_ids)
            .await
            .map_err(as_scan_error)?;
        let by_id: HashMap<Uuid, DocumentState> =
            states.into_iter().map(|s| (s.id, s)).collect();

        let cutoff = Utc::now() - self.grace_period;
        let mut orphans = Vec::new();

        for r in &refs {
            let state = by_id.get(&r.document_id);
            if let Some(reason) = orphan_reason(state, cutoff) {
                orphans.push(OrphanRecord {
                    embedding_id: r.id,
                    document_id: r.document_id,
                    collection_id: state.map(|s| s.collection_id),
                    reason,
                });
            }
        }

        Ok(ScanPage {
            examined: refs.len() as u64,
            orphans,
        })
    }
}

/// Classify one embedding's parent state.
///
/// Shared by the scan and by the executor's per-batch re-validation so both
/// apply identical eligibility rules.
pub fn orphan_reason(
    state: Option<&DocumentState>,
    cutoff: DateTime<Utc>,
) -> Option<OrphanReason> {
    match state {
        None => Some(OrphanReason::MissingParent),
        Some(s) if s.is_live(cutoff) => None,
        Some(_) => Some(OrphanReason::ParentDeleted),
    }
}

/// Errors during the scan phase are fatal scan errors, not batch errors
fn as_scan_error(err: CleanupError) -> CleanupError {
    match err {
        CleanupError::Database(e) => CleanupError::Scan(e.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockEmbeddingStore;
    use futures::{StreamExt, pin_mut};

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn options(scan_batch_size: u64, grace_period_hours: i64) -> CleanupOptions {
        CleanupOptions {
            scan_batch_size,
            grace_period_hours,
            ..CleanupOptions::default()
        }
    }

    async fn collect_pages<S: EmbeddingStore>(
        detector: &OrphanDetector<S>,
    ) -> Vec<CleanupResult<ScanPage>> {
        let stream = detector.pages();
        pin_mut!(stream);
        let mut pages = Vec::new();
        while let Some(page) = stream.next().await {
            pages.push(page);
        }
        pages
    }

    #[tokio::test]
    async fn test_classifies_missing_and_deleted_parents() {
        let live_doc = uuid(1);
        let deleted_doc = uuid(2);
        let missing_doc = uuid(3);
        let collection = uuid(9);

        let mut store = MockEmbeddingStore::new();
        store
            .expect_embedding_refs_after()
            .times(1)
            .returning(move |_, _| {
                Ok(vec![
                    EmbeddingRef { id: uuid(10), document_id: live_doc },
                    EmbeddingRef { id: uuid(11), document_id: deleted_doc },
                    EmbeddingRef { id: uuid(12), document_id: missing_doc },
                ])
            });
        store.expect_document_states().times(1).returning(move |_| {
            Ok(vec![
                DocumentState {
                    id: live_doc,
                    collection_id: collection,
                    deleted_at: None,
                },
                DocumentState {
                    id: deleted_doc,
                    collection_id: collection,
                    deleted_at: Some(Utc::now() - Duration::hours(48)),
                },
            ])
        });

        let detector = OrphanDetector::new(Arc::new(store), &options(100, 0));
        let pages = collect_pages(&detector).await;

        assert_eq!(pages.len(), 1);
        let page = pages.into_iter().next().unwrap().unwrap();
        assert_eq!(page.examined, 3);
        assert_eq!(page.orphans.len(), 2);

        let deleted = page
            .orphans
            .iter()
            .find(|o| o.document_id == deleted_doc)
            .unwrap();
        assert_eq!(deleted.reason, OrphanReason::ParentDeleted);
        assert_eq!(deleted.collection_id, Some(collection));

        let missing = page
            .orphans
            .iter()
            .find(|o| o.document_id == missing_doc)
            .unwrap();
        assert_eq!(missing.reason, OrphanReason::MissingParent);
        assert_eq!(missing.collection_id, None);
    }

    #[tokio::test]
    async fn test_grace_period_keeps_recent_soft_deletes() {
        let doc = uuid(1);

        let mut store = MockEmbeddingStore::new();
        store
            .expect_embedding_refs_after()
            .times(1)
            .returning(move |_, _| {
                Ok(vec![EmbeddingRef { id: uuid(10), document_id: doc }])
            });
        store.expect_document_states().times(1).returning(move |_| {
            Ok(vec![DocumentState {
                id: doc,
                collection_id: uuid(9),
                // Deleted one hour ago, inside a 24h grace window
                deleted_at: Some(Utc::now() - Duration::hours(1)),
            }])
        });

        let detector = OrphanDetector::new(Arc::new(store), &options(100, 24));
        let pages = collect_pages(&detector).await;

        let page = pages.into_iter().next().unwrap().unwrap();
        assert_eq!(page.examined, 1);
        assert!(page.orphans.is_empty());
    }

    #[tokio::test]
    async fn test_keyset_pagination_advances_cursor() {
        let doc = uuid(1);

        let mut store = MockEmbeddingStore::new();
        // Page 1: full page starting from no cursor
        store
            .expect_embedding_refs_after()
            .withf(|cursor, limit| cursor.is_none() && *limit == 2)
            .times(1)
            .returning(move |_, _| {
                Ok(vec![
                    EmbeddingRef { id: uuid(10), document_id: doc },
                    EmbeddingRef { id: uuid(11), document_id: doc },
                ])
            });
        // Page 2: short page after the last id of page 1
        store
            .expect_embedding_refs_after()
            .withf(move |cursor, _| *cursor == Some(uuid(11)))
            .times(1)
            .returning(move |_, _| {
                Ok(vec![EmbeddingRef { id: uuid(12), document_id: doc }])
            });
        store.expect_document_states().times(2).returning(move |_| {
            Ok(vec![DocumentState {
                id: doc,
                collection_id: uuid(9),
                deleted_at: None,
            }])
        });

        let detector = OrphanDetector::new(Arc::new(store), &options(2, 0));
        let pages = collect_pages(&detector).await;

        assert_eq!(pages.len(), 2);
        let examined: u64 = pages.iter().map(|p| p.as_ref().unwrap().examined).sum();
        assert_eq!(examined, 3);
    }

    #[tokio::test]
    async fn test_scan_error_ends_stream() {
        let mut store = MockEmbeddingStore::new();
        store
            .expect_embedding_refs_after()
            .times(1)
            .returning(|_, _| {
                Err(CleanupError::Database(sea_orm::DbErr::Custom(
                    "connection dropped".to_string(),
                )))
            });

        let detector = OrphanDetector::new(Arc::new(store), &options(100, 0));
        let pages = collect_pages(&detector).await;

        assert_eq!(pages.len(), 1);
        let err = pages.into_iter().next().unwrap().unwrap_err();
        assert!(matches!(err, CleanupError::Scan(_)));
        assert!(err.to_string().contains("connection dropped"));
    }

    #[test]
    fn test_orphan_reason_rules() {
        let cutoff = Utc::now();
        assert_eq!(orphan_reason(None, cutoff), Some(OrphanReason::MissingParent));

        let live = DocumentState {
            id: uuid(1),
            collection_id: uuid(2),
            deleted_at: None,
        };
        assert_eq!(orphan_reason(Some(&live), cutoff), None);

        let deleted = DocumentState {
            deleted_at: Some(cutoff - Duration::hours(1)),
            ..live
        };
        assert_eq!(
            orphan_reason(Some(&deleted), cutoff),
            Some(OrphanReason::ParentDeleted)
        );
    }
}
