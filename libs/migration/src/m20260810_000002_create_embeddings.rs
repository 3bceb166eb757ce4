use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create embeddings table. document_id intentionally carries no
        // foreign key constraint: the ingestion pipeline writes embeddings
        // out of band, which is why orphan rows can occur at all.
        manager
            .create_table(
                Table::create()
                    .table(Embeddings::Table)
                    .if_not_exists()
                    .col(pk_uuid(Embeddings::Id))
                    .col(uuid(Embeddings::DocumentId))
                    .col(
                        ColumnDef::new(Embeddings::Embedding)
                            .custom(Alias::new("vector"))
                            .not_null(),
                    )
                    .col(text(Embeddings::Content).default(""))
                    .col(integer(Embeddings::ChunkIndex))
                    .col(integer(Embeddings::ChunkStart))
                    .col(integer(Embeddings::ChunkEnd))
                    .col(
                        timestamp_with_time_zone(Embeddings::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create indexes
        manager
            .create_index(
                Index::create()
                    .name("idx_embeddings_document_id")
                    .table(Embeddings::Table)
                    .col(Embeddings::DocumentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Embeddings::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Embeddings {
    Table,
    Id,
    DocumentId,
    Embedding,
    Content,
    ChunkIndex,
    ChunkStart,
    ChunkEnd,
    CreatedAt,
}
