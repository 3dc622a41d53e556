//! Compilation tests: emitted SQL text and parameter lists.

mod common;

use std::sync::Arc;

use brook::prelude::*;
use common::MockExecutor;

fn users(executor: &Arc<MockExecutor>) -> QueryBuilder {
    QueryBuilder::new(executor.clone(), "users")
}

#[test]
fn select_with_filter_order_and_limit() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .select(["id", "name"])
        .where_eq("status", "active")
        .order_by("name", "ASC")
        .limit(2)
        .to_sql()
        .unwrap();

    assert_eq!(
        query.sql,
        "SELECT id, name FROM users WHERE status = ? ORDER BY name ASC LIMIT 2"
    );
    assert_eq!(query.params, vec![MySqlValue::Text("active".into())]);
}

#[test]
fn grouped_predicates_parenthesize_and_connect() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .group(|q| q.where_eq("name", "John").or_where_eq("name", "Jane"))
        .where_eq("status", "active")
        .to_sql()
        .unwrap();

    assert_eq!(
        query.sql,
        "SELECT * FROM users WHERE (name = ? OR name = ?) AND status = ?"
    );
    assert_eq!(
        query.params,
        vec![
            MySqlValue::Text("John".into()),
            MySqlValue::Text("Jane".into()),
            MySqlValue::Text("active".into()),
        ]
    );
}

#[test]
fn where_has_emits_correlated_exists() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .where_has_with("transactions", "user_id", "id", |q| {
            q.where_eq("status", "completed")
        })
        .to_sql()
        .unwrap();

    assert!(query.sql.contains(
        "EXISTS (SELECT 1 FROM transactions WHERE transactions.user_id = users.id AND status = ?)"
    ));
    assert_eq!(query.params, vec![MySqlValue::Text("completed".into())]);
}

#[test]
fn aggregate_alias_projects_and_rewrites_filters() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .with_sum(("transactions", "total"), "user_id", "id", "amount")
        .where_op("total", ">", 10000)
        .to_sql()
        .unwrap();

    assert!(query.sql.contains(
        "(SELECT SUM(amount) FROM transactions WHERE transactions.user_id = users.id) AS total"
    ));
    assert!(query.sql.contains(
        "(SELECT SUM(amount) FROM transactions WHERE transactions.user_id = users.id) > ?"
    ));
    assert!(query.sql.starts_with("SELECT users.*,"));
    assert_eq!(query.params, vec![MySqlValue::Int(10000)]);
}

#[test]
fn null_checks_against_aggregate_aliases_render_the_keyword() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .with_sum(("transactions", "total"), "user_id", "id", "amount")
        .where_op("total", "IS", Option::<i64>::None)
        .to_sql()
        .unwrap();

    // IS takes the NULL keyword, never a bound placeholder
    assert!(query.sql.contains(
        "(SELECT SUM(amount) FROM transactions WHERE transactions.user_id = users.id) IS NULL"
    ));
    assert!(query.params.is_empty());
}

#[test]
fn having_references_aggregate_aliases_without_promotion() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .with_sum(("transactions", "total"), "user_id", "id", "amount")
        .group_by(["id"])
        .having("total", ">", 10000)
        .to_sql()
        .unwrap();

    // The subquery appears once, in the projection; HAVING names the alias
    assert_eq!(query.sql.matches("SELECT SUM(amount)").count(), 1);
    assert!(query.sql.contains("HAVING total > ?"));
    assert_eq!(query.params, vec![MySqlValue::Int(10000)]);
}

#[test]
fn aggregate_registration_order_is_irrelevant() {
    let executor = MockExecutor::new();
    let filtered_first = users(&executor)
        .where_op("total", ">", 10)
        .with_sum(("transactions", "total"), "user_id", "id", "amount")
        .to_sql()
        .unwrap();
    let registered_first = users(&executor)
        .with_sum(("transactions", "total"), "user_id", "id", "amount")
        .where_op("total", ">", 10)
        .to_sql()
        .unwrap();
    assert_eq!(filtered_first, registered_first);
}

#[test]
fn placeholder_count_always_matches_parameters() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .select(["id"])
        .where_eq("status", "active")
        .where_in("role", ["admin", "editor"])
        .where_between("age", 21, 65)
        .where_has_with("transactions", "user_id", "id", |q| {
            q.where_op("amount", ">=", 100).where_in("status", ["ok"])
        })
        .or_group(|q| q.where_null("deleted_at").or_like("name", "jo", LikeSide::After))
        .to_sql()
        .unwrap();

    assert_eq!(query.sql.matches('?').count(), query.params.len());
}

#[test]
fn scalar_values_never_leak_into_sql_text() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .where_eq("name", "O'Hara; DROP TABLE users")
        .where_in("status", ["secret-status"])
        .to_sql()
        .unwrap();

    assert!(!query.sql.contains("O'Hara"));
    assert!(!query.sql.contains("secret-status"));
    assert_eq!(query.params.len(), 2);
}

#[test]
fn to_sql_is_idempotent() {
    let executor = MockExecutor::new();
    let builder = users(&executor)
        .where_eq("status", "active")
        .with_count("transactions", "user_id", "id")
        .order_by("id", "desc");
    let first = builder.to_sql().unwrap();
    let second = builder.to_sql().unwrap();
    assert_eq!(first, second);
}

#[test]
fn two_arity_equality_matches_explicit_operator() {
    let executor = MockExecutor::new();
    let shorthand = users(&executor).where_eq("status", "active").to_sql().unwrap();
    let explicit = users(&executor)
        .where_op("status", "=", "active")
        .to_sql()
        .unwrap();
    assert_eq!(shorthand, explicit);
}

#[test]
fn empty_in_is_always_false_and_empty_not_in_vanishes() {
    let executor = MockExecutor::new();
    let empty_in = users(&executor)
        .where_in("id", Vec::<i64>::new())
        .to_sql()
        .unwrap();
    assert_eq!(empty_in.sql, "SELECT * FROM users WHERE 1 = 0");
    assert!(empty_in.params.is_empty());

    let empty_not_in = users(&executor)
        .where_eq("status", "active")
        .where_not_in("id", Vec::<i64>::new())
        .to_sql()
        .unwrap();
    assert_eq!(empty_not_in.sql, "SELECT * FROM users WHERE status = ?");
}

#[test]
fn in_and_between_expand_placeholders() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .where_in("id", [1, 2, 3])
        .where_not_between("age", 13, 19)
        .to_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT * FROM users WHERE id IN (?, ?, ?) AND age NOT BETWEEN ? AND ?"
    );
    assert_eq!(query.params.len(), 5);
}

#[test]
fn null_checks_bind_nothing() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .where_null("deleted_at")
        .or_where_not_null("archived_at")
        .to_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT * FROM users WHERE deleted_at IS NULL OR archived_at IS NOT NULL"
    );
    assert!(query.params.is_empty());
}

#[test]
fn column_comparisons_interpolate_the_right_side() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .where_column("updated_at", ">", "created_at")
        .to_sql()
        .unwrap();
    assert_eq!(query.sql, "SELECT * FROM users WHERE updated_at > created_at");
    assert!(query.params.is_empty());
}

#[test]
fn like_escapes_metacharacters() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .like("name", "50%_off\\", LikeSide::Both)
        .to_sql()
        .unwrap();
    assert_eq!(query.sql, "SELECT * FROM users WHERE name LIKE ?");
    assert_eq!(
        query.params,
        vec![MySqlValue::Text("%50\\%\\_off\\\\%".into())]
    );
}

#[test]
fn search_groups_one_like_per_column() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .where_eq("status", "active")
        .search(["name", "email"], "jo")
        .to_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT * FROM users WHERE status = ? AND (name LIKE ? OR email LIKE ?)"
    );
    assert_eq!(query.params.len(), 3);
}

#[test]
fn joins_order_groups_and_having() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .select(["users.id"])
        .join("transactions", "transactions.user_id = users.id")
        .left_join("profiles", "profiles.user_id = users.id")
        .group_by(["users.id"])
        .having("users.id", ">", 10)
        .order_by("users.id", "DESC")
        .to_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT users.id FROM users \
         INNER JOIN transactions ON transactions.user_id = users.id \
         LEFT JOIN profiles ON profiles.user_id = users.id \
         GROUP BY users.id HAVING users.id > ? ORDER BY users.id DESC"
    );
}

#[test]
fn distinct_and_offset_render_in_place() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .distinct()
        .select(["status"])
        .limit(10)
        .offset(20)
        .to_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "SELECT DISTINCT status FROM users LIMIT 10 OFFSET 20"
    );

    // OFFSET without LIMIT is withheld
    let query = users(&executor).offset(20).to_sql().unwrap();
    assert_eq!(query.sql, "SELECT * FROM users");
}

#[test]
fn insert_single_and_bulk_rows() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .insert([brook::row! { "name" => "John", "status" => "active" }])
        .to_sql()
        .unwrap();
    assert_eq!(query.sql, "INSERT INTO users (name, status) VALUES (?, ?)");
    assert_eq!(query.params.len(), 2);

    // Bulk rows may list the same columns in any order; parameters are
    // emitted row-major in the first row's column order.
    let query = users(&executor)
        .insert([
            brook::row! { "name" => "a", "status" => "x" },
            brook::row! { "status" => "y", "name" => "b" },
        ])
        .to_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "INSERT INTO users (name, status) VALUES (?, ?), (?, ?)"
    );
    assert_eq!(
        query.params,
        vec![
            MySqlValue::Text("a".into()),
            MySqlValue::Text("x".into()),
            MySqlValue::Text("b".into()),
            MySqlValue::Text("y".into()),
        ]
    );
}

#[test]
fn update_renders_raw_assignments_literally() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .update(brook::row! { "status" => "archived", "visits" => raw("visits + 1") })
        .where_eq("id", 7)
        .to_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "UPDATE users SET status = ?, visits = visits + 1 WHERE id = ?"
    );
    assert_eq!(
        query.params,
        vec![MySqlValue::Text("archived".into()), MySqlValue::Int(7)]
    );
}

#[test]
fn upsert_appends_duplicate_key_clause() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .upsert(
            brook::row! { "id" => 1, "name" => "John" },
            brook::row! { "name" => "John", "visits" => raw("visits + 1") },
        )
        .to_sql()
        .unwrap();
    assert_eq!(
        query.sql,
        "INSERT INTO users (id, name) VALUES (?, ?) \
         ON DUPLICATE KEY UPDATE name = ?, visits = visits + 1"
    );
    assert_eq!(query.params.len(), 3);
}

#[test]
fn delete_with_filter() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .delete()
        .where_eq("status", "banned")
        .to_sql()
        .unwrap();
    assert_eq!(query.sql, "DELETE FROM users WHERE status = ?");
}

#[test]
fn relation_keys_are_auto_selected_for_narrowed_projections() {
    let executor = MockExecutor::new();
    let query = users(&executor)
        .select(["name"])
        .with_many("transactions", "user_id", "id")
        .to_sql()
        .unwrap();
    assert_eq!(query.sql, "SELECT name, users.id FROM users");
}

#[test]
fn has_degenerates_to_exists_only_for_at_least_one() {
    let executor = MockExecutor::new();
    let exists = users(&executor)
        .has("transactions", "user_id", "id", ">=", 1)
        .to_sql()
        .unwrap();
    assert!(exists.sql.contains("EXISTS (SELECT 1 FROM transactions"));
    assert!(exists.params.is_empty());

    let counted = users(&executor)
        .has("transactions", "user_id", "id", ">=", 3)
        .to_sql()
        .unwrap();
    assert!(counted.sql.contains(
        "(SELECT COUNT(*) FROM transactions WHERE transactions.user_id = users.id) >= ?"
    ));
    assert_eq!(counted.params, vec![MySqlValue::UInt(3)]);
}
