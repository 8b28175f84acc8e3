//! Pool lifecycle tests against the mock driver.
//!
//! All tests run on a paused-clock, current-thread runtime so that
//! background fills and timeouts are deterministic.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use pgks_driver::ConnectConfig;
use pgks_pool::{Pool, PoolError};
use pgks_testing::MockServer;
use tokio::time::timeout;
use tokio_test::assert_ok;

fn pool(server: &MockServer) -> Pool {
    Pool::new(server.factory(), ConnectConfig::new("test", "user", "secret"))
}

#[tokio::test(start_paused = true)]
async fn test_grow_opens_initial_block_eagerly() {
    let server = MockServer::new();
    let pool = pool(&server);

    pool.resize(5, 1).await.unwrap();
    // Only the initial block is open when resize returns; the spawned
    // fill task has not run yet on this single-threaded runtime.
    assert_eq!(server.opened(), 1);
    assert_eq!(pool.idle_count(), 1);

    tokio::task::yield_now().await;
    assert_eq!(server.opened(), 5);
    assert_eq!(pool.idle_count(), 5);
    assert_eq!(pool.total(), 5);
    assert_eq!(pool.target(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_grow_failure_in_initial_block_is_an_error() {
    let server = MockServer::new();
    server.fail_next_connects(1);
    let pool = pool(&server);

    let err = pool.resize(2, 1).await.unwrap_err();
    assert!(matches!(err, PoolError::Connect(_)));
}

#[tokio::test(start_paused = true)]
async fn test_background_fill_failure_abandons_remainder() {
    let server = MockServer::new();
    let pool = pool(&server);

    pool.resize(4, 1).await.unwrap();
    server.fail_next_connects(10);
    tokio::task::yield_now().await;

    // The eager connection survives; the background fill gave up.
    assert_eq!(pool.total(), 1);
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shrink_during_pending_fill_stops_the_fill() {
    let server = MockServer::new();
    let pool = pool(&server);

    pool.resize(5, 1).await.unwrap();
    // Shrink before the background fill has had a chance to run; its
    // captured deficit of four is now stale.
    pool.resize(1, 1).await.unwrap();
    tokio::task::yield_now().await;

    assert_eq!(pool.total(), 1);
    assert_eq!(pool.idle_count(), 1);
    assert_eq!(server.opened(), 1);
    assert_eq!(pool.target(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fill_landing_after_shrink_is_discarded() {
    let server = MockServer::new();
    server.delay_connects(Duration::from_millis(100));
    let pool = pool(&server);

    pool.resize(2, 1).await.unwrap();
    // Let the background fill start its open, then shrink under it with
    // the first connection checked out.
    tokio::task::yield_now().await;
    let held = pool.acquire().await.unwrap();
    pool.resize(1, 1).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.opened(), 2);
    assert_eq!(server.closed(), 1);
    assert_eq!(pool.total(), 1);
    assert_eq!(pool.idle_count(), 0);

    pool.release(held).await;
    assert_eq!(pool.total(), 1);
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_blocks_until_release() {
    let server = MockServer::new();
    let pool = pool(&server);
    pool.resize(1, 1).await.unwrap();

    let conn = pool.acquire().await.unwrap();
    assert!(
        timeout(Duration::from_millis(50), pool.acquire())
            .await
            .is_err()
    );

    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move {
            let conn = pool.acquire().await.unwrap();
            pool.release(conn).await;
        }
    });

    pool.release(conn).await;
    waiter.await.unwrap();
    assert_eq!(pool.idle_count(), 1);
    assert_eq!(server.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_try_acquire_does_not_wait() {
    let server = MockServer::new();
    let pool = pool(&server);
    pool.resize(1, 1).await.unwrap();

    let conn = pool.try_acquire().unwrap();
    assert!(matches!(pool.try_acquire(), Err(PoolError::Empty)));
    pool.release(conn).await;
    assert_ok!(pool.try_acquire());
}

#[tokio::test(start_paused = true)]
async fn test_release_discards_broken_connection() {
    let server = MockServer::new();
    server.lose_connection_on("SELECT 1");
    let pool = pool(&server);
    pool.resize(1, 1).await.unwrap();

    let mut conn = pool.acquire().await.unwrap();
    assert!(conn.execute("SELECT 1", &[]).await.is_err());
    assert!(conn.is_broken());

    pool.release(conn).await;
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.total(), 0);
    assert_eq!(server.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shrink_closes_idle_connections() {
    let server = MockServer::new();
    let pool = pool(&server);
    pool.resize(3, 3).await.unwrap();
    assert_eq!(pool.idle_count(), 3);

    pool.resize(1, 1).await.unwrap();
    assert_eq!(pool.idle_count(), 1);
    assert_eq!(pool.total(), 1);
    assert_eq!(server.closed(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shrink_drains_checked_out_connections_on_release() {
    let server = MockServer::new();
    let pool = pool(&server);
    pool.resize(2, 2).await.unwrap();

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    pool.resize(1, 1).await.unwrap();
    // Nothing idle to close yet.
    assert_eq!(pool.total(), 2);

    pool.release(first).await;
    assert_eq!(pool.total(), 1);
    assert_eq!(pool.idle_count(), 0);

    pool.release(second).await;
    assert_eq!(pool.total(), 1);
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_rejects_acquire_and_drains_idle() {
    let server = MockServer::new();
    let pool = pool(&server);
    pool.resize(2, 2).await.unwrap();

    let held = pool.acquire().await.unwrap();
    pool.close().await;
    assert!(pool.is_closed());
    assert_eq!(server.closed(), 1);

    assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));
    assert!(matches!(pool.try_acquire(), Err(PoolError::Closed)));

    // A connection still out when the pool closed is closed on release.
    pool.release(held).await;
    assert_eq!(server.closed(), 2);
    assert_eq!(pool.total(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_replace_opens_without_changing_accounting() {
    let server = MockServer::new();
    let pool = pool(&server);
    pool.resize(1, 1).await.unwrap();

    let _dead = pool.acquire().await.unwrap();
    let replacement = pool.replace().await.unwrap();
    assert_eq!(server.opened(), 2);
    assert_eq!(pool.total(), 1);

    pool.release(replacement).await;
    assert_eq!(pool.idle_count(), 1);
}
