//! Client configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pgks_driver::{ConnectConfig, SqlValue};

use crate::error::Error;

/// Optional sink invoked with `(sql, values)` before every execution.
pub type QueryLog = Arc<dyn Fn(&str, &[SqlValue]) + Send + Sync>;

/// Reconnect policy for connection-loss recovery.
///
/// When a session breaks mid-transaction, the engine reconnects with
/// exponential backoff and replays the whole unit of work. Backoff starts
/// at `initial_backoff`, doubles after each failed attempt, and is capped
/// at `max_backoff`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Backoff before the second reconnect attempt (default: 100ms).
    pub initial_backoff: Duration,
    /// Maximum backoff between attempts (default: 10s).
    pub max_backoff: Duration,
    /// Maximum number of reconnect attempts; `None` retries until the
    /// server comes back (default). When bounded and exhausted, the unit
    /// of work fails with [`Error::Connect`].
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial backoff duration.
    #[must_use]
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Set the maximum backoff duration.
    #[must_use]
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Bound the number of reconnect attempts.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

/// Per-call options for a unit of work.
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    /// Run without transactional wrapping, for statements that cannot
    /// run inside a transaction block (certain schema-evolution
    /// statements). Caller-declared, never auto-detected.
    pub autocommit: bool,
    /// Override the configured retry policy for this call.
    pub retry: Option<RetryPolicy>,
}

impl TransactionOptions {
    /// Create default options (transactional, configured retry policy).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable autocommit for this unit of work.
    #[must_use]
    pub fn autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// Override the retry policy for this unit of work.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// Configuration for a [`Db`](crate::Db) service.
#[derive(Clone)]
#[non_exhaustive]
pub struct DbConfig {
    /// Connection parameters handed to the factory.
    pub connect: ConnectConfig,

    /// Target pool size (default: 10).
    pub pool_size: usize,

    /// Number of connections opened synchronously when the pool grows;
    /// the remainder fills in the background (default: 1).
    pub initial_block: usize,

    /// Reconnect policy for connection-loss recovery.
    pub retry: RetryPolicy,

    /// Optional query log sink.
    pub log: Option<QueryLog>,
}

impl DbConfig {
    /// Create a configuration with default pool sizing and retry policy.
    #[must_use]
    pub fn new(connect: ConnectConfig) -> Self {
        Self {
            connect,
            pool_size: 10,
            initial_block: 1,
            retry: RetryPolicy::default(),
            log: None,
        }
    }

    /// Set the target pool size.
    #[must_use]
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the number of connections opened synchronously on grow.
    #[must_use]
    pub fn initial_block(mut self, count: usize) -> Self {
        self.initial_block = count;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Install a query log sink, invoked with `(sql, values)` before
    /// every execution.
    #[must_use]
    pub fn log(mut self, log: impl Fn(&str, &[SqlValue]) + Send + Sync + 'static) -> Self {
        self.log = Some(Arc::new(log));
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be greater than 0".into()));
        }
        if self.initial_block == 0 {
            return Err(Error::Config("initial_block must be greater than 0".into()));
        }
        Ok(())
    }
}

// Manual Debug: the log sink is not Debug and ConnectConfig redacts its
// credential itself.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("connect", &self.connect)
            .field("pool_size", &self.pool_size)
            .field("initial_block", &self.initial_block)
            .field("retry", &self.retry)
            .field("log", &self.log.as_ref().map(|_| "<sink>"))
            .finish()
    }
}
