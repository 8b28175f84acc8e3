//! Driver error types and connection-loss classification.

use thiserror::Error;

/// Errors reported by a driver implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The network/auth handshake failed; no session was established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The session was closed or broke mid-operation. The transaction
    /// engine treats this as retryable: it reconnects and replays the
    /// whole unit of work.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The database rejected the statement (syntax, constraint,
    /// permission, ...). Never retried.
    #[error("query failed: {0}")]
    Query(String),

    /// The statement produced no result set to fetch (a pure mutation).
    /// The query executor converts this into an empty row sequence; it
    /// never crosses the public API boundary.
    #[error("no results to fetch")]
    NoResultSet,

    /// IO error on the underlying transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Check whether this error means the session is gone and the unit of
    /// work should be replayed on a fresh connection.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_) | Self::Io(_))
    }

    /// Classify a raw error message from a driver that exposes no
    /// structured error kind.
    ///
    /// Prefers [`DriverError::ConnectionLost`] when the message matches a
    /// known disconnect phrase, otherwise falls back to
    /// [`DriverError::Query`].
    #[must_use]
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_disconnect_message(&message) {
            Self::ConnectionLost(message)
        } else {
            Self::Query(message)
        }
    }
}

/// Check whether an error message reported by the server or driver
/// indicates a lost session.
///
/// Compatibility note: some drivers expose disconnects only as message
/// text. The matched substrings below are the phrases emitted by
/// PostgreSQL and the common client libraries; they are centralized here
/// so the heuristic is trivial to replace for a driver with structured
/// error kinds (such drivers should construct
/// [`DriverError::ConnectionLost`] directly and never call this).
#[must_use]
pub fn is_disconnect_message(message: &str) -> bool {
    const DISCONNECT_PHRASES: &[&str] = &[
        "connection has been closed unexpectedly",
        "connection already closed",
        "server closed the connection unexpectedly",
        "terminating connection",
        "broken pipe",
    ];

    DISCONNECT_PHRASES
        .iter()
        .any(|phrase| message.contains(phrase))
}
