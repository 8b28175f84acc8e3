//! # pgks-pool
//!
//! Bounded connection pool with dynamic resize for the pgks access stack.
//!
//! The pool is a multiset of ready connections behind a semaphore whose
//! permit count mirrors the idle set. Connections enter the pool only
//! through [`Pool::resize`]; `acquire` hands out idle connections and
//! suspends the caller when none are available.
//!
//! ## Features
//!
//! - Blocking and non-blocking acquire
//! - Grow without downtime: a configurable number of connections open
//!   synchronously, the remainder fills in the background
//! - Graceful shrink: only idle connections are closed, in-use ones
//!   drain as they are released
//! - Broken connections are closed and dropped on release instead of
//!   being parked
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgks_pool::Pool;
//!
//! let pool = Pool::new(factory, connect_config);
//! pool.resize(10, 1).await?;
//!
//! let conn = pool.acquire().await?;
//! // Use connection...
//! pool.release(conn).await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod pool;

pub use error::PoolError;
pub use pool::Pool;
