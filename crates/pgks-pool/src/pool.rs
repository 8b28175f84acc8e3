//! Connection pool implementation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use pgks_driver::{ConnectConfig, Connection, ConnectionFactory, DriverError};

use crate::error::PoolError;

/// A bounded pool of ready connections.
///
/// Cloning is cheap; all clones share the same pool state. The permit
/// count of the internal semaphore always equals the length of the idle
/// deque, so `acquire` never busy-waits and a `release` wakes exactly one
/// waiter.
///
/// The pool never operates on a connection concurrently with its holder:
/// a handle is owned either by the idle set or by the task that acquired
/// it, never both.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    factory: Arc<dyn ConnectionFactory>,
    connect: Mutex<ConnectConfig>,
    idle: Mutex<VecDeque<Box<dyn Connection>>>,
    /// Permit count mirrors `idle.len()`.
    idle_permits: Semaphore,
    /// Desired pool size; `release` drains down to it after a shrink.
    target: AtomicUsize,
    /// Live connections: idle + checked out.
    total: AtomicUsize,
    closed: AtomicBool,
}

impl Pool {
    /// Create an empty pool. Connections are opened by [`resize`](Self::resize).
    #[must_use]
    pub fn new(factory: Arc<dyn ConnectionFactory>, connect: ConnectConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                factory,
                connect: Mutex::new(connect),
                idle: Mutex::new(VecDeque::new()),
                idle_permits: Semaphore::new(0),
                target: AtomicUsize::new(0),
                total: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Remove and return one idle connection, suspending the calling task
    /// until one is available.
    pub async fn acquire(&self) -> Result<Box<dyn Connection>, PoolError> {
        let permit = self
            .inner
            .idle_permits
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;
        permit.forget();

        // The permit guarantees an idle connection unless the pool was
        // drained by a concurrent close.
        self.inner
            .idle
            .lock()
            .pop_front()
            .ok_or(PoolError::Closed)
    }

    /// Remove and return one idle connection, failing with
    /// [`PoolError::Empty`] immediately when none is idle.
    pub fn try_acquire(&self) -> Result<Box<dyn Connection>, PoolError> {
        use tokio::sync::TryAcquireError;

        match self.inner.idle_permits.try_acquire() {
            Ok(permit) => permit.forget(),
            Err(TryAcquireError::NoPermits) => return Err(PoolError::Empty),
            Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
        }

        self.inner
            .idle
            .lock()
            .pop_front()
            .ok_or(PoolError::Closed)
    }

    /// Return a connection to the idle set.
    ///
    /// Must be called exactly once per successful acquire. A broken
    /// connection is closed and dropped from accounting instead of being
    /// parked; an excess connection after a shrink is closed so the pool
    /// drains down to its target.
    pub async fn release(&self, mut conn: Box<dyn Connection>) {
        if conn.is_broken() {
            tracing::warn!("dropping broken connection on release");
            self.discard(conn).await;
            return;
        }

        if self.inner.closed.load(Ordering::Acquire)
            || self.inner.total.load(Ordering::Acquire) > self.inner.target.load(Ordering::Acquire)
        {
            self.discard(conn).await;
            return;
        }

        conn.set_autocommit(false);
        self.inner.idle.lock().push_back(conn);
        self.inner.idle_permits.add_permits(1);
    }

    /// Change the pool's target size.
    ///
    /// Growing opens `min(initial_block, deficit)` connections before
    /// returning, then fills the remainder in the background so the first
    /// caller after startup is not blocked on a full fill. Shrinking
    /// closes excess idle connections immediately; in-use connections are
    /// left alone and drain via [`release`](Self::release).
    pub async fn resize(&self, target: usize, initial_block: usize) -> Result<(), PoolError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }

        self.inner.target.store(target, Ordering::Release);
        let total = self.inner.total.load(Ordering::Acquire);

        if target > total {
            let deficit = target - total;
            let eager = initial_block.min(deficit);
            tracing::info!(target, deficit, eager, "growing connection pool");

            for _ in 0..eager {
                self.open_into_idle()
                    .await
                    .map_err(|e| PoolError::Connect(e.to_string()))?;
            }

            let remainder = deficit - eager;
            if remainder > 0 {
                let pool = self.clone();
                tokio::spawn(async move {
                    for _ in 0..remainder {
                        if pool.inner.closed.load(Ordering::Acquire) {
                            break;
                        }
                        // The target may have shrunk since this fill was
                        // scheduled; the deficit captured at spawn time is
                        // stale then.
                        if pool.inner.total.load(Ordering::Acquire)
                            >= pool.inner.target.load(Ordering::Acquire)
                        {
                            break;
                        }
                        if let Err(error) = pool.open_into_idle().await {
                            tracing::warn!(%error, "background pool fill failed, abandoning remainder");
                            break;
                        }
                        // A shrink that raced the open above leaves the pool
                        // over target with this connection idle; drain it.
                        if pool.inner.total.load(Ordering::Acquire)
                            > pool.inner.target.load(Ordering::Acquire)
                        {
                            if let Ok(conn) = pool.try_acquire() {
                                pool.discard(conn).await;
                            }
                            break;
                        }
                    }
                });
            }
        } else {
            let mut excess = total - target;
            tracing::info!(target, excess, "shrinking connection pool");

            while excess > 0 {
                match self.try_acquire() {
                    Ok(conn) => self.discard(conn).await,
                    // Nothing idle left; in-use connections drain on release.
                    Err(_) => break,
                }
                excess -= 1;
            }
        }

        Ok(())
    }

    /// Open a replacement for a connection that died while checked out.
    ///
    /// The caller keeps responsibility for the dead handle's slot, so pool
    /// accounting is unchanged. Uses the current connect configuration,
    /// picking up any credentials swapped in since the original open.
    pub async fn replace(&self) -> Result<Box<dyn Connection>, DriverError> {
        let config = self.inner.connect.lock().clone();
        self.inner.factory.connect(&config).await
    }

    /// Give up the slot of a checked-out connection that died and could
    /// not be replaced. The capacity returns on the next
    /// [`resize`](Self::resize).
    pub fn forfeit(&self) {
        self.inner.total.fetch_sub(1, Ordering::Release);
    }

    /// Swap the connect configuration used for future opens.
    pub fn set_connect_config(&self, connect: ConnectConfig) {
        *self.inner.connect.lock() = connect;
    }

    /// Close the pool: reject new acquires and close all idle connections.
    ///
    /// Connections currently checked out are closed when released.
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.idle_permits.close();

        let drained: Vec<_> = {
            let mut idle = self.inner.idle.lock();
            idle.drain(..).collect()
        };
        for conn in drained {
            self.discard(conn).await;
        }
        tracing::info!("connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Number of idle connections.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.idle_permits.available_permits()
    }

    /// Live connections, idle and checked out.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inner.total.load(Ordering::Acquire)
    }

    /// Current target size.
    #[must_use]
    pub fn target(&self) -> usize {
        self.inner.target.load(Ordering::Acquire)
    }

    async fn open_into_idle(&self) -> Result<(), DriverError> {
        let config = self.inner.connect.lock().clone();
        let conn = self.inner.factory.connect(&config).await?;
        self.inner.total.fetch_add(1, Ordering::Release);
        self.inner.idle.lock().push_back(conn);
        self.inner.idle_permits.add_permits(1);
        Ok(())
    }

    /// Close a connection and drop it from accounting. Close failures are
    /// swallowed; closing a dead socket is not an error.
    async fn discard(&self, mut conn: Box<dyn Connection>) {
        if let Err(error) = conn.close().await {
            tracing::debug!(%error, "error while closing discarded connection");
        }
        self.inner.total.fetch_sub(1, Ordering::Release);
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("target", &self.target())
            .field("total", &self.total())
            .field("idle", &self.idle_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
