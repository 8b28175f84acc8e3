//! The database service: pooled connections, units of work, replay.

use std::sync::Arc;

use parking_lot::Mutex;

use pgks_driver::{ConnectionFactory, SqlValue};
use pgks_pool::{Pool, PoolError};

use crate::config::{DbConfig, QueryLog, RetryPolicy, TransactionOptions};
use crate::error::{Error, Result};
use crate::result::QueryResult;
use crate::statement::Predicate;
use crate::transaction::Transaction;

/// A handle to a pooled database.
///
/// Cloning is cheap; all clones share the same pool. Every operation
/// runs as a unit of work: a connection is taken from the pool, the
/// work runs inside a transaction, and a connection loss anywhere in
/// the middle reconnects and replays the whole unit before the caller
/// sees an error.
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

struct DbInner {
    pool: Pool,
    retry: Mutex<RetryPolicy>,
    log: Mutex<Option<QueryLog>>,
}

impl Db {
    /// Build the pool and open the initial connections.
    ///
    /// Blocks until `initial_block` connections are up; the rest of
    /// `pool_size` fills in the background.
    pub async fn connect(config: DbConfig, factory: Arc<dyn ConnectionFactory>) -> Result<Self> {
        config.validate()?;

        let pool = Pool::new(factory, config.connect.clone());
        pool.resize(config.pool_size, config.initial_block)
            .await
            .map_err(connect_error)?;

        Ok(Self {
            inner: Arc::new(DbInner {
                pool,
                retry: Mutex::new(config.retry),
                log: Mutex::new(config.log),
            }),
        })
    }

    /// Swap configuration on a live service: credentials for future
    /// opens, retry policy, log sink, and pool size. Existing
    /// connections keep running under the old credentials until they
    /// are replaced.
    pub async fn reconfigure(&self, config: DbConfig) -> Result<()> {
        config.validate()?;

        self.inner.pool.set_connect_config(config.connect.clone());
        *self.inner.retry.lock() = config.retry;
        *self.inner.log.lock() = config.log;
        self.inner
            .pool
            .resize(config.pool_size, config.initial_block)
            .await
            .map_err(connect_error)
    }

    /// Execute one statement as its own unit of work.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        self.transaction_with(TransactionOptions::new(), |tx| async move {
            tx.query(sql, params).await
        })
        .await
    }

    /// Execute one statement outside any transaction, for statements
    /// that cannot run inside a transaction block.
    pub async fn query_autocommit(&self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        self.transaction_with(
            TransactionOptions::new().autocommit(true),
            |tx| async move { tx.query(sql, params).await },
        )
        .await
    }

    /// Run a unit of work inside a transaction.
    ///
    /// The body may run more than once: when the connection breaks, the
    /// engine rolls back, reconnects with backoff, and replays the body
    /// from the start. Keep side effects inside the database, or make
    /// them idempotent.
    ///
    /// Returning [`Error::RollbackRequested`] from the body rolls the
    /// transaction back without treating it as a failure to log.
    pub async fn transaction<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.transaction_with(TransactionOptions::new(), body).await
    }

    /// Run a unit of work with explicit options.
    pub async fn transaction_with<F, Fut, T>(
        &self,
        options: TransactionOptions,
        mut body: F,
    ) -> Result<T>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let retry = options
            .retry
            .clone()
            .unwrap_or_else(|| self.inner.retry.lock().clone());
        let log = self.inner.log.lock().clone();

        let mut conn = self.inner.pool.acquire().await?;
        conn.set_autocommit(options.autocommit);
        let tx = Transaction::bind(self.inner.pool.clone(), conn, log, options.autocommit);

        loop {
            // Commit belongs to the replayed section: a connection lost
            // between the body and the commit replays like any other.
            let attempt = async {
                let value = body(tx.clone()).await?;
                tx.commit().await?;
                Ok(value)
            };

            match attempt.await {
                Ok(value) => {
                    tx.release().await;
                    return Ok(value);
                }
                Err(Error::ConnectionLost(message)) => {
                    tracing::warn!(%message, "connection lost, reconnecting to replay");
                    // The session may still be live when the loss was
                    // inferred from a server message; undo the first
                    // attempt's writes before abandoning the handle.
                    tx.rollback_quiet().await;
                    self.reconnect(&tx, &retry).await?;
                }
                Err(error) => {
                    tx.rollback_quiet().await;
                    tx.release().await;
                    return Err(error);
                }
            }
        }
    }

    /// Replace a transaction's dead connection, backing off between
    /// attempts. Backoff starts at the policy's initial value, doubles
    /// after each failure, and is capped at its maximum.
    async fn reconnect(&self, tx: &Transaction, retry: &RetryPolicy) -> Result<()> {
        tx.discard_dead().await;

        let mut backoff = retry.initial_backoff;
        let mut attempts: u32 = 0;
        loop {
            match self.inner.pool.replace().await {
                Ok(conn) => {
                    tracing::info!(attempts, "reconnected after connection loss");
                    tx.rebind(conn).await;
                    return Ok(());
                }
                Err(error) => {
                    attempts += 1;
                    if let Some(max) = retry.max_attempts {
                        if attempts >= max {
                            self.inner.pool.forfeit();
                            return Err(Error::Connect(format!(
                                "reconnect gave up after {attempts} attempts: {error}"
                            )));
                        }
                    }
                    tracing::warn!(%error, ?backoff, "reconnect failed, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(retry.max_backoff);
                }
            }
        }
    }

    /// Insert one row as its own unit of work, optionally returning a
    /// generated column. Inside a transaction body, use
    /// [`Transaction::insert`] instead so the write joins the open
    /// transaction.
    ///
    /// With no columns the statement inserts the table's defaults.
    pub async fn insert(
        &self,
        table: &str,
        columns: &[(&str, SqlValue)],
        returning: Option<&str>,
    ) -> Result<Option<SqlValue>> {
        self.transaction(|tx| async move { tx.insert(table, columns, returning).await })
            .await
    }

    /// Update rows matching every condition as its own unit of work,
    /// returning the number of rows updated. Inside a transaction body,
    /// use [`Transaction::update`] instead.
    pub async fn update(
        &self,
        table: &str,
        set: &[(&str, SqlValue)],
        conditions: &[(&str, Predicate)],
    ) -> Result<u64> {
        self.transaction(|tx| async move { tx.update(table, set, conditions).await })
            .await
    }

    /// Close the pool: reject new work and close idle connections.
    /// In-flight units of work finish; their connections close on
    /// release.
    pub async fn close(&self) {
        self.inner.pool.close().await;
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.inner.pool
    }
}

fn connect_error(error: PoolError) -> Error {
    match error {
        PoolError::Connect(message) => Error::Connect(message),
        other => Error::Pool(other),
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("pool", &self.inner.pool)
            .finish_non_exhaustive()
    }
}
