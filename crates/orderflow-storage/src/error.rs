//! Storage error types for the record store abstraction layer.

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

/// Errors that can occur during record store operations.
///
/// `NotFound` is the only variant that means "the order does not exist".
/// Every other variant describes a failure to find out.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested order was not found.
    #[error("Order not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: Uuid,
    },

    /// The order data is invalid for this backend.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Description of why the record is invalid.
        message: String,
    },

    /// A multi-step write failed and was rolled back.
    #[error("Transaction error: {message}")]
    TransactionError {
        /// Description of the transaction error.
        message: String,
    },

    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// The operation did not complete within its deadline.
    #[error("Operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: &'static str,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(id: Uuid) -> Self {
        Self::NotFound { id }
    }

    /// Creates a new `InvalidRecord` error.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates a new `TransactionError` error.
    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout { operation, timeout }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if a retry of the same operation might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError { .. } | Self::Timeout { .. } | Self::TransactionError { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::InvalidRecord { .. } => ErrorCategory::Validation,
            Self::TransactionError { .. } => ErrorCategory::Transaction,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Timeout { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Order not found.
    NotFound,
    /// Validation error.
    Validation,
    /// Transaction-related error.
    Transaction,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Validation => write!(f, "validation"),
            Self::Transaction => write!(f, "transaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = Uuid::nil();
        let err = StorageError::not_found(id);
        assert_eq!(
            err.to_string(),
            "Order not found: 00000000-0000-0000-0000-000000000000"
        );

        let err = StorageError::timeout("get_by_id", Duration::from_secs(5));
        assert_eq!(err.to_string(), "Operation 'get_by_id' timed out after 5s");
    }

    #[test]
    fn test_not_found_is_distinct_from_infrastructure() {
        assert!(StorageError::not_found(Uuid::nil()).is_not_found());
        assert!(!StorageError::connection_error("refused").is_not_found());
        assert!(!StorageError::timeout("get_by_id", Duration::from_secs(1)).is_not_found());
        assert!(!StorageError::internal("boom").is_not_found());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found(Uuid::nil()).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::connection_error("down").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            StorageError::transaction_error("rolled back").category(),
            ErrorCategory::Transaction
        );
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }

    #[test]
    fn test_transient_errors() {
        assert!(StorageError::connection_error("down").is_transient());
        assert!(StorageError::timeout("insert", Duration::from_secs(5)).is_transient());
        assert!(!StorageError::invalid_record("bad").is_transient());
        assert!(!StorageError::not_found(Uuid::nil()).is_transient());
    }
}
