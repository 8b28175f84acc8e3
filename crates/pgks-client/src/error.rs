//! Client error types.

use thiserror::Error;

use pgks_driver::DriverError;
use pgks_pool::PoolError;

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Opening a connection failed, or reconnection attempts were
    /// exhausted.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The session broke mid-operation. Handled internally by the
    /// transaction engine (reconnect and replay); surfaces only when a
    /// statement is issued outside any recovery scope.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The database rejected the statement. Never retried; always
    /// re-raised to the caller unchanged.
    #[error("query failed: {0}")]
    Query(String),

    /// The unit of work intentionally requested an abort. A control
    /// value, not a fault: callers match on it to distinguish an
    /// expected rollback from a real failure.
    #[error("rollback requested")]
    RollbackRequested,

    /// A table or column name failed validation (potential SQL
    /// injection attempt).
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Pool error.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check whether this is the intentional-abort signal.
    #[must_use]
    pub fn is_rollback(&self) -> bool {
        matches!(self, Self::RollbackRequested)
    }
}

impl From<DriverError> for Error {
    fn from(error: DriverError) -> Self {
        match error {
            DriverError::Connect(message) => Self::Connect(message),
            DriverError::ConnectionLost(message) => Self::ConnectionLost(message),
            DriverError::Io(error) => Self::ConnectionLost(error.to_string()),
            DriverError::Query(message) => Self::Query(message),
            // Filtered into an empty row set by the executor; mapped here
            // only to keep the conversion total.
            DriverError::NoResultSet => Self::Query("no results to fetch".to_string()),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
