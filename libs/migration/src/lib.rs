pub use sea_orm_migration::prelude::*;

mod m20260810_000000_bootstrap;
mod m20260810_000001_create_documents;
mod m20260810_000002_create_embeddings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260810_000000_bootstrap::Migration),
            Box::new(m20260810_000001_create_documents::Migration),
            Box::new(m20260810_000002_create_embeddings::Migration),
        ]
    }
}
