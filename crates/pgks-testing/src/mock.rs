//! In-memory mock driver.
//!
//! [`MockServer`] plays the database: it records committed statements,
//! serves canned result sets, and injects failures on request.
//! [`MockConnection`] models one session with its own staged (uncommitted)
//! writes, so transactional isolation is observable from tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use pgks_driver::{ConnectConfig, Connection, ConnectionFactory, DriverError, Row, SqlValue};

/// A statement as recorded by the mock: SQL text plus bound parameters.
pub type Statement = (String, Vec<SqlValue>);

#[derive(Default)]
struct ServerState {
    committed: Vec<Statement>,
    responses: HashMap<String, (Arc<[String]>, Vec<Vec<SqlValue>>)>,
    fail_connects: u32,
    connect_delay: Option<Duration>,
    lose_connection_on: HashSet<String>,
    report_lost_on: HashSet<String>,
    lose_connection_on_commit: bool,
    fail_statements: HashMap<String, String>,
    opened: u32,
    closed: u32,
    rollbacks: u32,
}

/// The shared fake database behind all mock connections.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<ServerState>>,
}

impl MockServer {
    /// Create a fresh mock server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a factory that opens connections against this server.
    #[must_use]
    pub fn factory(&self) -> Arc<dyn ConnectionFactory> {
        Arc::new(MockFactory {
            server: self.clone(),
        })
    }

    /// Register a canned result set for a statement. The response stays
    /// registered, so repeated executions see the same rows.
    pub fn respond(&self, sql: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) {
        let columns: Arc<[String]> = columns.iter().map(|c| (*c).to_string()).collect();
        self.state
            .lock()
            .responses
            .insert(sql.to_string(), (columns, rows));
    }

    /// Make the next `n` connect attempts fail with a connect error.
    pub fn fail_next_connects(&self, n: u32) {
        self.state.lock().fail_connects = n;
    }

    /// Add a delay to every connect attempt.
    pub fn delay_connects(&self, delay: Duration) {
        self.state.lock().connect_delay = Some(delay);
    }

    /// Break the session on the next execution of the given statement.
    /// The failure fires once; the replayed statement succeeds.
    pub fn lose_connection_on(&self, sql: &str) {
        self.state.lock().lose_connection_on.insert(sql.to_string());
    }

    /// Report a lost connection on the next execution of the given
    /// statement without actually breaking the session, like a server
    /// announcing termination while the socket still works. Fires once.
    pub fn report_connection_lost_on(&self, sql: &str) {
        self.state.lock().report_lost_on.insert(sql.to_string());
    }

    /// Break the session on the next commit. Fires once; the retried
    /// commit succeeds.
    pub fn lose_connection_on_commit(&self) {
        self.state.lock().lose_connection_on_commit = true;
    }

    /// Reject every execution of the given statement with a query error.
    pub fn fail_statement(&self, sql: &str, message: &str) {
        self.state
            .lock()
            .fail_statements
            .insert(sql.to_string(), message.to_string());
    }

    /// Statements committed so far, in commit order.
    #[must_use]
    pub fn committed(&self) -> Vec<Statement> {
        self.state.lock().committed.clone()
    }

    /// SQL text of committed statements, in commit order.
    #[must_use]
    pub fn committed_sql(&self) -> Vec<String> {
        self.state
            .lock()
            .committed
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    /// Number of sessions opened so far.
    #[must_use]
    pub fn opened(&self) -> u32 {
        self.state.lock().opened
    }

    /// Number of sessions closed so far.
    #[must_use]
    pub fn closed(&self) -> u32 {
        self.state.lock().closed
    }

    /// Number of rollbacks that reached the server.
    #[must_use]
    pub fn rollbacks(&self) -> u32 {
        self.state.lock().rollbacks
    }
}

/// Factory opening [`MockConnection`]s against a [`MockServer`].
pub struct MockFactory {
    server: MockServer,
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn connect(&self, _config: &ConnectConfig) -> Result<Box<dyn Connection>, DriverError> {
        let delay = self.server.state.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.server.state.lock();
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(DriverError::Connect("mock connect failure".to_string()));
        }
        state.opened += 1;

        Ok(Box::new(MockConnection {
            server: self.server.clone(),
            staged: Vec::new(),
            pending: None,
            autocommit: false,
            broken: false,
            closed: false,
        }))
    }
}

/// One mock session: staged writes become visible on commit only.
pub struct MockConnection {
    server: MockServer,
    staged: Vec<Statement>,
    pending: Option<Vec<Row>>,
    autocommit: bool,
    /// The session is unusable: it died, or it was closed.
    broken: bool,
    /// `close` was called; counted once even for a dead session.
    closed: bool,
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DriverError> {
        if self.broken {
            return Err(DriverError::ConnectionLost(
                "connection already closed".to_string(),
            ));
        }

        {
            let mut state = self.server.state.lock();
            if state.lose_connection_on.remove(sql) {
                self.broken = true;
                return Err(DriverError::ConnectionLost(
                    "connection has been closed unexpectedly".to_string(),
                ));
            }

            if state.report_lost_on.remove(sql) {
                return Err(DriverError::ConnectionLost(
                    "terminating connection due to administrator command".to_string(),
                ));
            }

            if let Some(message) = state.fail_statements.get(sql) {
                return Err(DriverError::Query(message.clone()));
            }

            if let Some((columns, rows)) = state.responses.get(sql) {
                let rows: Vec<Row> = rows
                    .iter()
                    .map(|values| Row::new(Arc::clone(columns), values.clone()))
                    .collect();
                let affected = rows.len() as u64;
                self.pending = Some(rows);
                return Ok(affected);
            }
        }

        // No canned response: treat as a mutation of one row.
        self.pending = None;
        self.staged.push((sql.to_string(), params.to_vec()));
        if self.autocommit {
            let mut state = self.server.state.lock();
            state.committed.append(&mut self.staged);
        }
        Ok(1)
    }

    async fn fetch_rows(&mut self) -> Result<Vec<Row>, DriverError> {
        if self.broken {
            return Err(DriverError::ConnectionLost(
                "connection already closed".to_string(),
            ));
        }
        self.pending.take().ok_or(DriverError::NoResultSet)
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        if self.broken {
            return Err(DriverError::ConnectionLost(
                "connection already closed".to_string(),
            ));
        }
        let mut state = self.server.state.lock();
        if state.lose_connection_on_commit {
            state.lose_connection_on_commit = false;
            drop(state);
            self.broken = true;
            return Err(DriverError::ConnectionLost(
                "server closed the connection unexpectedly".to_string(),
            ));
        }
        state.committed.append(&mut self.staged);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        if self.broken {
            return Err(DriverError::ConnectionLost(
                "connection already closed".to_string(),
            ));
        }
        self.staged.clear();
        self.server.state.lock().rollbacks += 1;
        Ok(())
    }

    fn set_autocommit(&mut self, autocommit: bool) {
        self.autocommit = autocommit;
    }

    fn is_broken(&self) -> bool {
        self.broken
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.broken = true;
        if !self.closed {
            self.closed = true;
            self.server.state.lock().closed += 1;
        }
        Ok(())
    }
}
