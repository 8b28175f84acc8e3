//! # pgks-client
//!
//! High-level async PostgreSQL access with pooled connections and
//! transparent recovery.
//!
//! This is the primary public API surface for the pgks project. Every
//! operation runs as a *unit of work*: a connection is taken from the
//! pool, the work runs inside a transaction, and when the connection
//! breaks mid-flight the engine reconnects with exponential backoff and
//! replays the whole unit. The caller never sees a transient
//! connection loss, only its own query errors.
//!
//! ## Features
//!
//! - **Bounded pool**: resizable at runtime, only the first connection
//!   blocks startup
//! - **Units of work**: whole-body replay after connection loss, with
//!   exponential backoff
//! - **Typed rows**: name- or index-addressed values without a schema
//!   compiler
//! - **Statement builders**: injection-hardened `INSERT`/`UPDATE`
//!   generation and `LIKE` escaping
//! - **Query log**: an optional sink observing every `(sql, values)`
//!   pair
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgks_client::{ConnectConfig, Db, DbConfig, Error};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DbConfig::new(ConnectConfig::new("test", "user", "password"));
//!     let db = Db::connect(config, factory).await?;
//!
//!     let result = db
//!         .query("SELECT \"title\" FROM \"item\" WHERE \"id\" = $1", &[7.into()])
//!         .await?;
//!     if let Some(row) = result.first() {
//!         println!("title: {:?}", row.get("title"));
//!     }
//!
//!     // Several statements in one transaction; a connection loss
//!     // anywhere in the body replays the whole block.
//!     db.transaction(|tx| async move {
//!         tx.query("UPDATE \"item\" SET \"n\" = \"n\" + 1", &[]).await?;
//!         tx.query("DELETE FROM \"audit\"", &[]).await?;
//!         Ok(())
//!     })
//!     .await?;
//!
//!     // An intentional abort, distinguishable from failure.
//!     let out = db
//!         .transaction(|tx| async move {
//!             tx.query("DELETE FROM \"item\"", &[]).await?;
//!             Err::<(), _>(Error::RollbackRequested)
//!         })
//!         .await;
//!     assert!(out.unwrap_err().is_rollback());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod db;
pub mod error;
pub mod result;
pub mod statement;
pub mod transaction;

pub use config::{DbConfig, QueryLog, RetryPolicy, TransactionOptions};
pub use db::Db;
pub use error::{Error, Result};
pub use result::QueryResult;
pub use statement::{Predicate, escape_like, escape_like_with, insert_statement, update_statement};
pub use transaction::Transaction;

// The driver seam and the pool, for implementors and tests.
pub use pgks_driver::{ConnectConfig, Connection, ConnectionFactory, DriverError, Row, SqlValue};
pub use pgks_pool::{Pool, PoolError};
