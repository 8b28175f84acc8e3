//! Connection and factory traits.
//!
//! These traits are the seam between the access layer and the wire
//! protocol. `#[async_trait]` keeps them object-safe: the pool and the
//! transaction engine work with `Box<dyn Connection>` so any driver (or
//! the test mock) can sit behind them.

use async_trait::async_trait;

use crate::config::ConnectConfig;
use crate::error::DriverError;
use crate::row::Row;
use crate::value::SqlValue;

/// One physical session with the database.
///
/// A connection is owned by exactly one place at a time: the pool while
/// idle, or one transaction context while in use. Implementations do not
/// need to be `Sync`; ownership transfer through the pool is the only
/// synchronization mechanism.
#[async_trait]
pub trait Connection: Send {
    /// Execute a statement with positional parameter binding and return
    /// the number of rows matched or returned.
    ///
    /// Parameters must be bound driver-natively; implementations must
    /// never interpolate values into the SQL text.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DriverError>;

    /// Materialize the rows produced by the last [`execute`](Self::execute).
    ///
    /// Statements that yield no result set fail with
    /// [`DriverError::NoResultSet`]; callers convert that into an empty
    /// row sequence.
    async fn fetch_rows(&mut self) -> Result<Vec<Row>, DriverError>;

    /// Commit the open transaction. A no-op in autocommit mode.
    async fn commit(&mut self) -> Result<(), DriverError>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> Result<(), DriverError>;

    /// Enable or disable autocommit for subsequent statements.
    fn set_autocommit(&mut self, autocommit: bool);

    /// Check whether the session is known to be closed or broken.
    fn is_broken(&self) -> bool;

    /// Close the session. Closing an already-dead session is not an error.
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Opens physical connections from static configuration.
///
/// No retry happens here; reconnect-with-backoff is the transaction
/// engine's responsibility.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Open one connection, failing with [`DriverError::Connect`] if the
    /// network/auth handshake fails.
    async fn connect(&self, config: &ConnectConfig) -> Result<Box<dyn Connection>, DriverError>;
}
