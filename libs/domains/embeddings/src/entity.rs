//! Sea-ORM entities for the ingestion-owned schema.
//!
//! The cleanup job reads `documents` and reads/deletes `embeddings`; it never
//! writes either table otherwise. Schema drift surfaces as query errors, not
//! something this crate migrates or repairs.

pub mod document {
    use sea_orm::entity::prelude::*;

    /// Sea-ORM Entity for the documents table (read-only for cleanup)
    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "documents")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub collection_id: Uuid,
        #[sea_orm(column_type = "Text")]
        pub title: String,
        /// Soft-delete marker; NULL = live
        pub deleted_at: Option<DateTimeWithTimeZone>,
        pub created_at: DateTimeWithTimeZone,
        pub updated_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<Model> for crate::models::DocumentState {
        fn from(model: Model) -> Self {
            Self {
                id: model.id,
                collection_id: model.collection_id,
                deleted_at: model.deleted_at.map(|t| t.with_timezone(&chrono::Utc)),
            }
        }
    }
}

pub mod embedding {
    use sea_orm::entity::prelude::*;

    /// Sea-ORM Entity for the embeddings table.
    ///
    /// `document_id` is a plain column, not a database-enforced foreign key;
    /// that absence of enforcement is precisely why orphans occur.
    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "embeddings")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub document_id: Uuid,
        /// pgvector payload; scans never select this column
        pub embedding: PgVector,
        #[sea_orm(column_type = "Text")]
        pub content: String,
        /// Ordinal of the chunk within its document
        pub chunk_index: i32,
        pub chunk_start: i32,
        pub chunk_end: i32,
        pub created_at: DateTimeWithTimeZone,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
