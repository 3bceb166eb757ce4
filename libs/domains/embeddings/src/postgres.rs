use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use uuid::Uuid;

use crate::entity::{document, embedding};
use crate::error::CleanupResult;
use crate::models::{DocumentState, EmbeddingRef};
use crate::repository::EmbeddingStore;

/// SeaORM-backed store accessor over the documents and embeddings tables
pub struct PgEmbeddingStore {
    db: DatabaseConnection,
}

impl PgEmbeddingStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl EmbeddingStore for PgEmbeddingStore {
    async fn count_documents(&self) -> CleanupResult<u64> {
        Ok(document::Entity::find().count(&self.db).await?)
    }

    async fn count_embeddings(&self) -> CleanupResult<u64> {
        Ok(embedding::Entity::find().count(&self.db).await?)
    }

    async fn embedding_refs_after(
        &self,
        cursor: Option<Uuid>,
        limit: u64,
    ) -> CleanupResult<Vec<EmbeddingRef>> {
        let mut query = embedding::Entity::find()
            .select_only()
            .column(embedding::Column::Id)
            .column(embedding::Column::DocumentId)
            .order_by_asc(embedding::Column::Id)
            .limit(limit);

        if let Some(after) = cursor {
            query = query.filter(embedding::Column::Id.gt(after));
        }

        let rows: Vec<(Uuid, Uuid)> = query.into_tuple().all(&self.db).await?;

        Ok(rows
            .into_iter()
            .map(|(id, document_id)| EmbeddingRef { id, document_id })
            .collect())
    }

    async fn document_states(&self, ids: &[Uuid]) -> CleanupResult<Vec<DocumentState>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = document::Entity::find()
            .filter(document::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn delete_embeddings(&self, ids: &[Uuid]) -> CleanupResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        // One transaction per batch: a half-applied batch is never possible
        let txn = self.db.begin().await?;
        let result = embedding::Entity::delete_many()
            .filter(embedding::Column::Id.is_in(ids.iter().copied()))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        tracing::debug!(
            requested = ids.len(),
            deleted = result.rows_affected,
            "Deleted embedding batch"
        );

        Ok(result.rows_affected)
    }
}
