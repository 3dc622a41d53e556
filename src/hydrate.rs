//! Two-query eager loading.
//!
//! For each registered relation: collect the parents' key tuples, fetch all
//! matching related rows in one query, group them by foreign key, and
//! attach them to their parents. Nested relations registered by a filter
//! callback recurse through the sub-builder's own terminal. A parent with
//! no matching children always receives the empty value for the relation,
//! never a missing cell.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;

use brook_core::error::Result;
use brook_core::{MySqlValue, Sql, SqlChunk, Token};

use crate::ast::{Conn, Predicate, Projection, RelationKind, RelationSpec};
use crate::builder::QueryBuilder;
use crate::compile::bare_column;
use crate::executor::Executor;
use crate::row::{Cell, Row};

/// Loads and attaches every relation in `relations` onto `rows`.
///
/// Boxed so the recursion through nested relations stays finitely typed.
pub(crate) fn hydrate_rows<'a>(
    executor: &'a Arc<dyn Executor>,
    rows: &'a mut [Row],
    relations: &'a [RelationSpec],
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        for relation in relations {
            hydrate_one(executor, rows, relation).await?;
        }
        Ok(())
    })
}

async fn hydrate_one(
    executor: &Arc<dyn Executor>,
    rows: &mut [Row],
    relation: &RelationSpec,
) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let local_keys = bare_keys(&relation.local_key);
    let foreign_keys = bare_keys(&relation.foreign_key);

    let mut sub = QueryBuilder::new(executor.clone(), relation.table.clone());
    let keyed = if relation.foreign_key.len() == 1 {
        match collect_single(rows, &local_keys[0]) {
            Some(values) => {
                sub = sub.where_in(relation.foreign_key[0].clone(), values);
                true
            }
            None => false,
        }
    } else {
        match collect_tuples(rows, &local_keys) {
            Some(tuples) => {
                sub.ast.wheres.push(Predicate::Fragment {
                    sql: tuple_match(&relation.foreign_key, &tuples),
                    conn: Conn::And,
                });
                true
            }
            None => false,
        }
    };

    // No parent carries a complete non-null key: nothing can match, so
    // skip the query and attach empties.
    if !keyed {
        attach_empty(rows, relation);
        return Ok(());
    }

    if let Some(filter) = &relation.filter {
        sub = (filter.as_ref())(sub);
    }

    // A narrowed projection must still return the foreign keys we group
    // by; anything added here is stripped before attachment.
    let mut strip = Vec::new();
    if !sub.ast.projection.is_empty() {
        for key in &foreign_keys {
            if sub.ast.projection.iter().any(|entry| entry.covers(key)) {
                continue;
            }
            sub.ast
                .projection
                .push(Projection::Column(format!("{}.{}", relation.table, key)));
            strip.push(key.clone());
        }
    }

    // Nested relations registered by the filter hydrate inside this call.
    let children = sub.get().await?;

    let mut grouped: HashMap<Vec<MySqlValue>, Vec<Row>> = HashMap::new();
    for mut child in children {
        let Some(key) = child.key_tuple(&foreign_keys) else {
            continue;
        };
        for column in &strip {
            child.remove(column);
        }
        grouped.entry(key).or_default().push(child);
    }

    for row in rows.iter_mut() {
        let matched = row.key_tuple(&local_keys).and_then(|key| grouped.get(&key));
        let cell = match relation.kind {
            RelationKind::HasMany => Cell::Many(matched.cloned().unwrap_or_default()),
            RelationKind::HasOne => Cell::One(
                matched
                    .and_then(|children| children.first())
                    .cloned()
                    .map(Box::new),
            ),
        };
        row.set(relation.name.clone(), cell);
    }
    Ok(())
}

fn bare_keys(keys: &[String]) -> Vec<String> {
    keys.iter().map(|key| bare_column(key).to_owned()).collect()
}

fn attach_empty(rows: &mut [Row], relation: &RelationSpec) {
    for row in rows.iter_mut() {
        let cell = match relation.kind {
            RelationKind::HasMany => Cell::Many(Vec::new()),
            RelationKind::HasOne => Cell::One(None),
        };
        row.set(relation.name.clone(), cell);
    }
}

/// Unique non-null key values across the parent rows, in first-seen order.
/// `None` when no parent has one.
fn collect_single(rows: &[Row], key: &str) -> Option<Vec<MySqlValue>> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for row in rows {
        if let Some(value) = row.value(key) {
            if !value.is_null() && seen.insert(value.clone()) {
                values.push(value.clone());
            }
        }
    }
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Unique complete key tuples across the parent rows; tuples containing
/// NULL are dropped. `None` when no parent has a complete tuple.
fn collect_tuples(rows: &[Row], keys: &[String]) -> Option<Vec<Vec<MySqlValue>>> {
    let mut seen = HashSet::new();
    let mut tuples = Vec::new();
    for row in rows {
        if let Some(tuple) = row.key_tuple(keys) {
            if seen.insert(tuple.clone()) {
                tuples.push(tuple);
            }
        }
    }
    if tuples.is_empty() {
        None
    } else {
        Some(tuples)
    }
}

/// `((fk1 = ? AND fk2 = ?) OR (fk1 = ? AND fk2 = ?) OR ...)` with one
/// disjunct per parent key tuple.
fn tuple_match(foreign_key: &[String], tuples: &[Vec<MySqlValue>]) -> Sql {
    let mut disjunction = Sql::empty();
    for (index, tuple) in tuples.iter().enumerate() {
        if index > 0 {
            disjunction = disjunction.push(Token::OR);
        }
        let mut conjunction = Sql::empty();
        for (position, (key, value)) in foreign_key.iter().zip(tuple).enumerate() {
            if position > 0 {
                conjunction = conjunction.push(Token::AND);
            }
            conjunction = conjunction
                .push(SqlChunk::ident(key.clone()))
                .push(Token::EQ)
                .push(SqlChunk::param(value.clone()));
        }
        disjunction = disjunction.append(conjunction.parens());
    }
    disjunction.parens()
}
