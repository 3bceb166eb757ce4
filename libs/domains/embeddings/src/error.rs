use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleanupError {
    /// Raw database error as surfaced by the store; the caller decides
    /// whether it is fatal based on the phase it occurred in
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Query failed mid-stream; fatal from that point forward
    #[error("Scan failed: {0}")]
    Scan(String),

    /// A single delete transaction failed; recovered per-batch
    #[error("Delete batch failed: {0}")]
    Delete(String),
}

pub type CleanupResult<T> = Result<T, CleanupError>;
