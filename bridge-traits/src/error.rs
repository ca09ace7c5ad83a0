use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A write collided with a uniqueness constraint.
    ///
    /// Kept apart from [`BridgeError::DatabaseError`] so callers can retry a
    /// lost insert race as a lookup.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether this error is the storage uniqueness signal.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, BridgeError::UniqueViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
