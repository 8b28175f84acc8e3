//! Query execution and statement helper tests against the mock driver.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use parking_lot::Mutex;

use pgks_client::{ConnectConfig, Db, DbConfig, Error, Predicate, SqlValue};
use pgks_testing::MockServer;

fn config() -> DbConfig {
    DbConfig::new(ConnectConfig::new("test", "user", "secret"))
        .pool_size(2)
        .initial_block(2)
}

async fn connect(server: &MockServer) -> Db {
    Db::connect(config(), server.factory()).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_select_returns_typed_rows() {
    let server = MockServer::new();
    server.respond(
        "SELECT \"id\", \"title\" FROM \"item\"",
        &["id", "title"],
        vec![
            vec![SqlValue::Int(1), SqlValue::Text("first".into())],
            vec![SqlValue::Int(2), SqlValue::Text("second".into())],
        ],
    );
    let db = connect(&server).await;

    let result = db
        .query("SELECT \"id\", \"title\" FROM \"item\"", &[])
        .await
        .unwrap();
    assert_eq!(result.affected, 2);
    assert_eq!(result.rows.len(), 2);

    let first = result.first().unwrap();
    assert_eq!(first.get("id"), Some(&SqlValue::Int(1)));
    // Column lookup ignores ASCII case.
    assert_eq!(first.get("TITLE"), Some(&SqlValue::Text("first".into())));

    let titles: Vec<&str> = result
        .rows
        .iter()
        .filter_map(|row| row.get("title").and_then(SqlValue::as_str))
        .collect();
    assert_eq!(titles, vec!["first", "second"]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_row_select_has_no_first_row() {
    let server = MockServer::new();
    server.respond("SELECT \"id\" FROM \"item\"", &["id"], Vec::new());
    let db = connect(&server).await;

    let result = db.query("SELECT \"id\" FROM \"item\"", &[]).await.unwrap();
    assert_eq!(result.affected, 0);
    assert!(result.is_empty());
    assert!(result.first().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_mutation_reports_affected_with_empty_rows() {
    let server = MockServer::new();
    let db = connect(&server).await;

    let result = db
        .query("DELETE FROM \"item\" WHERE \"id\" = $1", &[7i64.into()])
        .await
        .unwrap();
    assert_eq!(result.affected, 1);
    assert!(result.rows.is_empty());
    assert_eq!(
        server.committed(),
        vec![(
            "DELETE FROM \"item\" WHERE \"id\" = $1".to_string(),
            vec![SqlValue::Int(7)]
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_query_error_propagates_unchanged() {
    let server = MockServer::new();
    server.fail_statement("SELECT broken", "syntax error at or near \"broken\"");
    let db = connect(&server).await;

    let err = db.query("SELECT broken", &[]).await.unwrap_err();
    match err {
        Error::Query(message) => assert!(message.contains("syntax error")),
        other => panic!("expected query error, got {other:?}"),
    }

    // The failure did not poison the service.
    assert_eq!(db.query("INSERT 1", &[]).await.unwrap().affected, 1);
}

#[tokio::test(start_paused = true)]
async fn test_insert_returning_generated_value() {
    let server = MockServer::new();
    server.respond(
        "INSERT INTO \"item\" (\"title\") VALUES ($1) RETURNING \"id\"",
        &["id"],
        vec![vec![SqlValue::Int(42)]],
    );
    let db = connect(&server).await;

    let id = db
        .insert("item", &[("title", "hello".into())], Some("id"))
        .await
        .unwrap();
    assert_eq!(id, Some(SqlValue::Int(42)));
}

#[tokio::test(start_paused = true)]
async fn test_insert_defaults_without_returning() {
    let server = MockServer::new();
    let db = connect(&server).await;

    let id = db.insert("item", &[], None).await.unwrap();
    assert_eq!(id, None);
    assert_eq!(server.committed_sql(), vec![
        "INSERT INTO \"item\" DEFAULT VALUES".to_string()
    ]);
}

#[tokio::test(start_paused = true)]
async fn test_update_orders_set_params_before_where() {
    let server = MockServer::new();
    let db = connect(&server).await;

    let affected = db
        .update(
            "item",
            &[("parent_id", 42i64.into())],
            &[("id", Predicate::Eq(1i64.into()))],
        )
        .await
        .unwrap();
    assert_eq!(affected, 1);
    assert_eq!(
        server.committed(),
        vec![(
            "UPDATE \"item\" SET \"parent_id\" = $1 WHERE \"id\" = $2".to_string(),
            vec![SqlValue::Int(42), SqlValue::Int(1)]
        )]
    );
}

#[tokio::test(start_paused = true)]
async fn test_bad_identifier_is_rejected_before_execution() {
    let server = MockServer::new();
    let db = connect(&server).await;

    let err = db
        .insert("item\" --", &[("title", "x".into())], None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier(_)));
    assert!(server.committed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_log_sink_sees_every_statement() {
    let server = MockServer::new();
    let logged: Arc<Mutex<Vec<(String, Vec<SqlValue>)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&logged);

    let config = config().log(move |sql, values| {
        sink.lock().push((sql.to_string(), values.to_vec()));
    });
    let db = Db::connect(config, server.factory()).await.unwrap();

    db.update(
        "item",
        &[("parent_id", 42i64.into())],
        &[("id", Predicate::Eq(1i64.into()))],
    )
    .await
    .unwrap();

    assert_eq!(logged.lock().as_slice(), &[(
        "UPDATE \"item\" SET \"parent_id\" = $1 WHERE \"id\" = $2".to_string(),
        vec![SqlValue::Int(42), SqlValue::Int(1)]
    )]);
}

#[tokio::test(start_paused = true)]
async fn test_reconfigure_resizes_and_swaps_log() {
    let server = MockServer::new();
    let db = connect(&server).await;
    assert_eq!(db.pool().target(), 2);

    let logged: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&logged);
    db.reconfigure(
        config()
            .pool_size(4)
            .initial_block(4)
            .log(move |sql, _| sink.lock().push(sql.to_string())),
    )
    .await
    .unwrap();

    assert_eq!(db.pool().target(), 4);
    assert_eq!(db.pool().total(), 4);

    db.query("SELECT 1", &[]).await.unwrap();
    assert_eq!(logged.lock().as_slice(), &["SELECT 1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_connect_validates_config() {
    let server = MockServer::new();
    let err = Db::connect(config().pool_size(0), server.factory())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_surfaces_as_connect_error() {
    let server = MockServer::new();
    server.fail_next_connects(2);
    let err = Db::connect(config(), server.factory()).await.unwrap_err();
    assert!(matches!(err, Error::Connect(_)));
}

#[tokio::test(start_paused = true)]
async fn test_close_rejects_further_work() {
    let server = MockServer::new();
    let db = connect(&server).await;
    db.close().await;

    let err = db.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, Error::Pool(_)));
}
