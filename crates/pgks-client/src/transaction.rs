//! Transaction handle bound to one pooled connection.

use std::sync::Arc;

use pgks_driver::{Connection, DriverError, SqlValue};
use pgks_pool::Pool;
use tokio::sync::Mutex;

use crate::config::QueryLog;
use crate::error::{Error, Result};
use crate::result::QueryResult;
use crate::statement::{self, Predicate};

/// A handle to an in-flight unit of work.
///
/// Every query issued through the same handle runs on the same
/// connection, inside the same database transaction. The handle is
/// cheap to clone; clones share the bound connection, which is how a
/// unit-of-work body passes it down its call tree.
///
/// Handles are created by [`Db::transaction`](crate::Db::transaction)
/// and its variants, never directly.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxInner>,
}

struct TxInner {
    /// `None` only transiently during reconnect, or after the engine has
    /// released the connection back to the pool.
    conn: Mutex<Option<Box<dyn Connection>>>,
    pool: Pool,
    log: Option<QueryLog>,
    autocommit: bool,
}

impl Transaction {
    pub(crate) fn bind(
        pool: Pool,
        conn: Box<dyn Connection>,
        log: Option<QueryLog>,
        autocommit: bool,
    ) -> Self {
        Self {
            inner: Arc::new(TxInner {
                conn: Mutex::new(Some(conn)),
                pool,
                log,
                autocommit,
            }),
        }
    }

    /// Execute a statement on the bound connection.
    ///
    /// Rows are fetched only when the statement affected or returned at
    /// least one row; a statement with no result set yields an empty
    /// `rows` with its `affected` count intact.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        if let Some(log) = &self.inner.log {
            log(sql, params);
        }
        tracing::debug!(sql, params = params.len(), "executing statement");

        let mut guard = self.inner.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::ConnectionLost("transaction already finished".to_string()))?;

        let affected = conn.execute(sql, params).await?;
        let rows = if affected == 0 {
            Vec::new()
        } else {
            match conn.fetch_rows().await {
                Ok(rows) => rows,
                Err(DriverError::NoResultSet) => Vec::new(),
                Err(error) => return Err(error.into()),
            }
        };
        Ok(QueryResult::new(rows, affected))
    }

    /// Insert one row on the bound connection, optionally returning a
    /// generated column. Joins the enclosing transaction; nothing is
    /// committed until the unit of work commits.
    pub async fn insert(
        &self,
        table: &str,
        columns: &[(&str, SqlValue)],
        returning: Option<&str>,
    ) -> Result<Option<SqlValue>> {
        let (sql, params) = statement::insert_statement(table, columns, returning)?;
        let result = self.query(&sql, &params).await?;

        if returning.is_none() {
            return Ok(None);
        }
        Ok(result
            .into_first()
            .and_then(|row| row.into_values().into_iter().next()))
    }

    /// Update rows matching every condition on the bound connection,
    /// returning the number of rows updated.
    pub async fn update(
        &self,
        table: &str,
        set: &[(&str, SqlValue)],
        conditions: &[(&str, Predicate)],
    ) -> Result<u64> {
        let (sql, params) = statement::update_statement(table, set, conditions)?;
        Ok(self.query(&sql, &params).await?.affected)
    }

    /// Run a nested unit of work on this transaction's connection.
    ///
    /// Nesting does not open a second connection or a savepoint: the
    /// body joins the enclosing transaction, and an error (including
    /// [`Error::RollbackRequested`]) propagates to the outermost level,
    /// rolling back everything.
    pub async fn transaction<F, Fut, T>(&self, mut body: F) -> Result<T>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        body(self.clone()).await
    }

    /// Commit the bound transaction. A no-op in autocommit mode.
    pub(crate) async fn commit(&self) -> Result<()> {
        if self.inner.autocommit {
            return Ok(());
        }
        let mut guard = self.inner.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::ConnectionLost("transaction already finished".to_string()))?;
        conn.commit().await?;
        Ok(())
    }

    /// Best-effort rollback before the engine classifies a failure. A
    /// rollback error never masks the original one.
    pub(crate) async fn rollback_quiet(&self) {
        let mut guard = self.inner.conn.lock().await;
        if let Some(conn) = guard.as_mut() {
            if let Err(error) = conn.rollback().await {
                tracing::warn!(%error, "rollback after failed unit of work also failed");
            }
        }
    }

    /// Close and drop the dead connection ahead of a reconnect. The
    /// pool slot stays reserved for the replacement.
    pub(crate) async fn discard_dead(&self) {
        let mut guard = self.inner.conn.lock().await;
        if let Some(mut conn) = guard.take() {
            if let Err(error) = conn.close().await {
                tracing::debug!(%error, "error while closing dead connection");
            }
        }
    }

    /// Bind a replacement connection after a reconnect.
    pub(crate) async fn rebind(&self, mut conn: Box<dyn Connection>) {
        conn.set_autocommit(self.inner.autocommit);
        *self.inner.conn.lock().await = Some(conn);
    }

    /// Return the bound connection to the pool. The handle is unusable
    /// afterwards.
    pub(crate) async fn release(&self) {
        let conn = self.inner.conn.lock().await.take();
        if let Some(conn) = conn {
            self.inner.pool.release(conn).await;
        }
    }
}

impl Drop for TxInner {
    fn drop(&mut self) {
        // Reached with a live connection only when the unit of work was
        // cancelled mid-flight: the engine's normal paths release first.
        if let Some(mut conn) = self.conn.get_mut().take() {
            let pool = self.pool.clone();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(error) = conn.rollback().await {
                        tracing::warn!(%error, "rollback of cancelled unit of work failed");
                    }
                    pool.release(conn).await;
                });
            }
            // Without a runtime the process is tearing down and the
            // socket closes with it.
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("autocommit", &self.inner.autocommit)
            .finish_non_exhaustive()
    }
}
