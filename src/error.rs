//! Error types for the budget index

use thiserror::Error;

/// Result type alias for budget index operations
pub type Result<T> = std::result::Result<T, BudgetIndexError>;

/// Error types that can occur in budget index operations
#[derive(Error, Debug)]
pub enum BudgetIndexError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector: {reason}")]
    InvalidVector { reason: String },

    #[error("Invalid top_k: {value}")]
    InvalidTopK { value: String },

    #[error("Index and metadata diverged: {index_len} vectors, {metadata_len} records")]
    Inconsistent { index_len: usize, metadata_len: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Lock poisoned")]
    LockPoisoned,
}

impl BudgetIndexError {
    /// Whether the error was caused by caller input rather than by the service.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BudgetIndexError::DimensionMismatch { .. }
                | BudgetIndexError::InvalidVector { .. }
                | BudgetIndexError::InvalidTopK { .. }
        )
    }
}
