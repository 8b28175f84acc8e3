//! Pool error types.

use thiserror::Error;

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Non-blocking acquire found no idle connection.
    #[error("no idle connection in pool")]
    Empty,

    /// Pool is closed.
    #[error("pool is closed")]
    Closed,

    /// Opening a connection during resize failed.
    #[error("failed to open connection: {0}")]
    Connect(String),
}
