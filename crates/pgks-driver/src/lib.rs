//! # pgks-driver
//!
//! Driver abstraction layer for the pgks access stack.
//!
//! The pool and transaction engine in the sibling crates never speak the
//! wire protocol themselves. They operate on the traits defined here:
//! a [`ConnectionFactory`] opens physical sessions and a [`Connection`]
//! executes statements, fetches rows, and manages transaction state.
//! Real drivers implement these traits; `pgks-testing` provides an
//! in-memory implementation for tests.
//!
//! Cooperative I/O is the trait boundary itself: every blocking driver
//! operation is an `async fn`, so socket readiness is handled by the
//! runtime rather than a process-wide wait callback.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod row;
pub mod value;

pub use config::ConnectConfig;
pub use connection::{Connection, ConnectionFactory};
pub use error::{DriverError, is_disconnect_message};
pub use row::Row;
pub use value::SqlValue;
