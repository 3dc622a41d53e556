//! Builder-surface tests: validation, deferred errors, state machine.

mod common;

use std::sync::Arc;

use brook::prelude::*;
use common::MockExecutor;

fn users(executor: &Arc<MockExecutor>) -> QueryBuilder {
    QueryBuilder::new(executor.clone(), "users")
}

#[test]
fn groups_nest_to_arbitrary_depth() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .group(|q| {
            q.where_eq("a", 1)
                .or_group(|q| q.where_eq("b", 2).where_eq("c", 3))
        })
        .where_eq("d", 4)
        .to_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT * FROM users WHERE (a = ? OR (b = ? AND c = ?)) AND d = ?"
    );
}

#[test]
fn empty_groups_vanish() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .group(|q| q)
        .where_eq("status", "active")
        .to_sql()
        .unwrap();
    assert_eq!(query.sql, "SELECT * FROM users WHERE status = ?");
}

#[test]
fn malformed_identifiers_are_rejected() {
    let executor = MockExecutor::new();
    let err = users(&executor)
        .where_eq("status; DROP TABLE users", 1)
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, BrookError::InvalidIdentifier { context: "WHERE", .. }));

    let err = QueryBuilder::new(executor.clone(), "users u").to_sql().unwrap_err();
    assert!(matches!(err, BrookError::InvalidIdentifier { context: "FROM", .. }));

    let err = users(&executor).order_by("name)", "ASC").to_sql().unwrap_err();
    assert!(matches!(
        err,
        BrookError::InvalidIdentifier { context: "ORDER BY", .. }
    ));
}

#[test]
fn unknown_operators_and_directions_are_rejected() {
    let executor = MockExecutor::new();
    let err = users(&executor)
        .where_op("id", "=>", 1)
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, BrookError::UnsupportedOperator { .. }));

    // LIKE belongs to the comparison set only
    let err = users(&executor)
        .where_column("a", "LIKE", "b")
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, BrookError::UnsupportedOperator { .. }));

    let err = users(&executor)
        .order_by("name", "SIDEWAYS")
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, BrookError::UnsupportedDirection { .. }));
}

#[test]
fn null_values_require_is_operators() {
    let executor = MockExecutor::new();
    let err = users(&executor)
        .where_op("deleted_at", "=", Option::<i64>::None)
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, BrookError::Validation { .. }));

    let query = users(&executor)
        .where_op("deleted_at", "is", Option::<i64>::None)
        .to_sql()
        .unwrap();
    assert_eq!(query.sql, "SELECT * FROM users WHERE deleted_at IS NULL");
}

#[test]
fn negative_limits_fail_and_zero_is_accepted() {
    let executor = MockExecutor::new();
    let err = users(&executor).limit(-1).to_sql().unwrap_err();
    assert!(matches!(err, BrookError::Validation { context: "LIMIT", .. }));

    let query = users(&executor).limit(0).to_sql().unwrap();
    assert_eq!(query.sql, "SELECT * FROM users LIMIT 0");
}

#[test]
fn composite_keys_must_pair_up() {
    let executor = MockExecutor::new();
    let err = users(&executor)
        .where_has("orders", ["user_id", "region"], "id")
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, BrookError::Validation { .. }));

    let err = users(&executor)
        .with_many("orders", ["user_id"], ["id", "region"])
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, BrookError::Validation { context: "RELATION", .. }));
}

#[test]
fn payload_shapes_are_validated() {
    let executor = MockExecutor::new();
    let err = users(&executor).insert(Vec::new()).to_sql().unwrap_err();
    assert!(matches!(err, BrookError::Validation { context: "INSERT", .. }));

    let err = users(&executor)
        .insert([
            brook::row! { "name" => "a" },
            brook::row! { "email" => "b" },
        ])
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, BrookError::Validation { context: "INSERT", .. }));

    // Raw markers cannot reach an insert payload
    let err = users(&executor)
        .insert([brook::row! { "visits" => raw("visits + 1") }])
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, BrookError::Validation { context: "INSERT", .. }));

    let err = users(&executor)
        .upsert(brook::row! { "id" => 1 }, brook::row! {})
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, BrookError::Validation { context: "UPSERT", .. }));

    let err = users(&executor).update(brook::row! {}).to_sql().unwrap_err();
    assert!(matches!(err, BrookError::Validation { context: "UPDATE", .. }));
}

#[test]
fn first_validation_failure_sticks() {
    let executor = MockExecutor::new();
    let err = users(&executor)
        .where_op("id", "=>", 1)
        .where_eq("bad ident", 2)
        .to_sql()
        .unwrap_err();
    // The earlier operator failure wins over the later identifier failure
    assert!(matches!(err, BrookError::UnsupportedOperator { .. }));
}

#[tokio::test]
async fn terminals_reset_the_ast() {
    let executor = MockExecutor::new();
    let mut builder = users(&executor)
        .select(["id"])
        .where_eq("status", "active")
        .order_by("id", "ASC")
        .limit(5);
    builder.get().await.unwrap();
    assert_eq!(builder.to_sql().unwrap().sql, "SELECT * FROM users");
}

#[tokio::test]
async fn row_terminals_reject_mutations_and_vice_versa() {
    let executor = MockExecutor::new();
    let mut builder = users(&executor).delete();
    assert!(builder.get().await.is_err());

    let mut builder = users(&executor).where_eq("id", 1);
    assert!(builder.execute().await.is_err());
}

#[tokio::test]
async fn first_limits_to_one_row() {
    let executor = MockExecutor::new();
    executor.push_rows(vec![common::user_row(1, "John", "active")]);
    let mut builder = users(&executor).where_eq("status", "active");
    let row = builder.first().await.unwrap().unwrap();
    assert_eq!(row.value("name"), Some(&MySqlValue::Text("John".into())));
    assert!(executor.sql_log()[0].ends_with("LIMIT 1"));
}

#[tokio::test]
async fn value_plucks_one_column() {
    let executor = MockExecutor::new();
    executor.push_rows(vec![common::user_row(1, "John", "active")]);
    let value = users(&executor).value("name").await.unwrap();
    assert_eq!(value, Some(MySqlValue::Text("John".into())));

    let missing = users(&executor).value("name").await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn count_wraps_the_pending_query() {
    let executor = MockExecutor::new();
    executor.push_rows(vec![brook::Row::from_pairs([("aggregate", 3i64)])]);
    let count = users(&executor)
        .where_eq("status", "active")
        .count()
        .await
        .unwrap();
    assert_eq!(count, 3);
    assert_eq!(
        executor.sql_log()[0],
        "SELECT COUNT(*) AS aggregate FROM (SELECT * FROM users WHERE status = ?) count_sub"
    );
}
