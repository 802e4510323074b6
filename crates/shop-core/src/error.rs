//! Error Types

use thiserror::Error;

/// Result type alias for store and model operations
pub type Result<T> = std::result::Result<T, ShopError>;

/// Errors raised by the domain model and the stores
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopError {
    /// Input failed validation (missing fields, negative prices, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced record does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Record conflicts with an existing one (duplicate username, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backing store failed to read or write
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ShopError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        ShopError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ShopError::Validation(msg.into())
    }
}
