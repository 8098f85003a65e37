//! Error types for the PostgreSQL backend.

use orderflow_storage::StorageError;
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code for unique violation (23505).
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL error code for serialization failure (40001).
pub const PG_SERIALIZATION_FAILURE: &str = "40001";

/// PostgreSQL error code for deadlock detected (40P01).
pub const PG_DEADLOCK_DETECTED: &str = "40P01";

/// PostgreSQL error code for admin shutdown (57P01).
pub const PG_ADMIN_SHUTDOWN: &str = "57P01";

/// PostgreSQL error code for undefined table (42P01).
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    pg_error_code(err).as_deref() == Some(code)
}

fn pg_error_code(err: &SqlxError) -> Option<String> {
    if let SqlxError::Database(db_err) = err {
        db_err.code().map(|c| c.into_owned())
    } else {
        None
    }
}

/// Maps a sqlx error raised by `operation` into a storage error.
///
/// Connection-class failures (pool exhaustion, I/O, SQLSTATE class 08,
/// server shutdown) become `ConnectionError`; concurrency aborts become
/// `TransactionError`; everything else is `Internal`.
pub fn map_sqlx_error(operation: &str, err: SqlxError) -> StorageError {
    match &err {
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) | SqlxError::Tls(_) => {
            StorageError::connection_error(format!("{operation}: {err}"))
        }
        SqlxError::Database(_) => match pg_error_code(&err).as_deref() {
            Some(code) if code.starts_with("08") || code == PG_ADMIN_SHUTDOWN => {
                StorageError::connection_error(format!("{operation}: {err}"))
            }
            Some(PG_SERIALIZATION_FAILURE | PG_DEADLOCK_DETECTED) => {
                StorageError::transaction_error(format!("{operation}: {err}"))
            }
            Some(PG_UNIQUE_VIOLATION) => {
                StorageError::invalid_record(format!("{operation}: duplicate order id"))
            }
            Some(PG_UNDEFINED_TABLE) => StorageError::internal(format!(
                "{operation}: schema missing, were migrations run? ({err})"
            )),
            _ => StorageError::internal(format!("{operation}: {err}")),
        },
        _ => StorageError::internal(format!("{operation}: {err}")),
    }
}

/// Errors specific to the PostgreSQL backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx_core::error::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => StorageError::connection_error(e.to_string()),
            PostgresError::Migration(e) => StorageError::internal(format!("Migration error: {e}")),
            PostgresError::Config { message } => {
                StorageError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::config("invalid URL");
        assert!(err.to_string().contains("Configuration error"));

        let err = PostgresError::Migration("checksum mismatch".into());
        assert!(err.to_string().contains("Migration error"));
    }

    #[test]
    fn test_conversion_to_storage_error() {
        let storage_err: StorageError = PostgresError::config("test error").into();
        assert!(matches!(storage_err, StorageError::Internal { .. }));

        let storage_err: StorageError = PostgresError::Connection(SqlxError::PoolTimedOut).into();
        assert!(matches!(storage_err, StorageError::ConnectionError { .. }));
    }

    #[test]
    fn test_pool_failures_are_connection_errors() {
        let err = map_sqlx_error("get_by_id", SqlxError::PoolTimedOut);
        assert!(matches!(err, StorageError::ConnectionError { .. }));
        assert!(!err.is_not_found());

        let err = map_sqlx_error("insert", SqlxError::PoolClosed);
        assert!(matches!(err, StorageError::ConnectionError { .. }));
    }

    #[test]
    fn test_row_not_found_is_not_conflated_with_missing_order() {
        let err = map_sqlx_error("get_by_id", SqlxError::RowNotFound);
        assert!(matches!(err, StorageError::Internal { .. }));
    }
}
