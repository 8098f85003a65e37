use thiserror::Error;

/// Core error types for Orderflow domain values
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid order ID: {0}")]
    InvalidId(String),

    #[error("Invalid order: {message}")]
    InvalidOrder { message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new InvalidOrder error
    pub fn invalid_order(message: impl Into<String>) -> Self {
        Self::InvalidOrder {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
