//! # pgks-testing
//!
//! Test infrastructure for pgks development.
//!
//! Provides an in-memory mock driver implementing the `pgks-driver`
//! traits, so the pool and transaction engine can be exercised without a
//! database. The mock keeps transactional state per connection (staged
//! writes become visible only on commit) and can be scripted to fail
//! connects, delay connects, or drop the session on a chosen statement.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgks_testing::MockServer;
//!
//! let server = MockServer::new();
//! server.respond(
//!     "SELECT \"id\" FROM \"item\"",
//!     &["id"],
//!     vec![vec![1i64.into()], vec![2i64.into()]],
//! );
//! server.lose_connection_on("INSERT INTO \"item\" DEFAULT VALUES");
//!
//! let factory = server.factory();
//! // Hand the factory to a Pool or Db and assert on server.committed().
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock;

pub use mock::{MockConnection, MockFactory, MockServer, Statement};
