/// Error type for the database crate's connection and migration helpers
///
/// Raw SeaORM errors convert in via `From`, so crate functions can use `?`
/// while callers match on what actually went wrong.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// PostgreSQL-specific errors (SeaORM)
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sea_orm::DbErr),

    /// Connection failed after retries
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Health check failed
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// Migration error
    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Result type alias for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = DatabaseError::ConnectionFailed("pool timed out".to_string());
        assert_eq!(err.to_string(), "Connection failed: pool timed out");

        let err = DatabaseError::HealthCheckFailed("SELECT 1 returned nothing".to_string());
        assert!(err.to_string().starts_with("Health check failed:"));

        let err = DatabaseError::MigrationError("m20250101 failed".to_string());
        assert!(err.to_string().starts_with("Migration error:"));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_db_err_converts_to_postgres_variant() {
        let db_err = sea_orm::DbErr::Custom("boom".to_string());
        let err: DatabaseError = db_err.into();
        assert!(matches!(err, DatabaseError::Postgres(_)));
        assert!(err.to_string().contains("boom"));
    }
}
