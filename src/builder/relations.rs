//! Eager-load and aggregate registration.
//!
//! Relations are loaded after the parent query runs, one extra query per
//! relation, and attached to the parent rows under the relation name.
//! Aggregates materialize as correlated scalar subqueries in the SELECT
//! projection; their aliases double as filter targets.

use std::sync::Arc;

use brook_core::error::{BrookError, Result};
use brook_core::ident::validate_ident;
use brook_core::Raw;

use crate::ast::{
    AggregateFn, AggregateSpec, KeyList, Predicate, RelationFilter, RelationKind, RelationSpec,
    RelationTarget,
};

use super::QueryBuilder;

impl QueryBuilder {
    // ==================== relations ====================

    /// Eager-loads a single related row per parent under the target name;
    /// parents without a match get `null`.
    pub fn with_one(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
    ) -> Self {
        self.push_relation(RelationKind::HasOne, target.into(), foreign_key.into(), local_key.into(), None)
    }

    /// As [`QueryBuilder::with_one`], refining the relation query through
    /// `filter` at load time.
    pub fn with_one_with(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        filter: impl Fn(QueryBuilder) -> QueryBuilder + Send + Sync + 'static,
    ) -> Self {
        self.push_relation(
            RelationKind::HasOne,
            target.into(),
            foreign_key.into(),
            local_key.into(),
            Some(Arc::new(filter)),
        )
    }

    /// Eager-loads all related rows per parent under the target name;
    /// parents without matches get an empty list.
    pub fn with_many(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
    ) -> Self {
        self.push_relation(RelationKind::HasMany, target.into(), foreign_key.into(), local_key.into(), None)
    }

    /// As [`QueryBuilder::with_many`], refining the relation query through
    /// `filter` at load time. The filter may register nested relations.
    pub fn with_many_with(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        filter: impl Fn(QueryBuilder) -> QueryBuilder + Send + Sync + 'static,
    ) -> Self {
        self.push_relation(
            RelationKind::HasMany,
            target.into(),
            foreign_key.into(),
            local_key.into(),
            Some(Arc::new(filter)),
        )
    }

    fn push_relation(
        self,
        kind: RelationKind,
        target: RelationTarget,
        foreign_key: KeyList,
        local_key: KeyList,
        filter: Option<RelationFilter>,
    ) -> Self {
        self.apply(move |builder| {
            let (table, name) = parse_target(&target, "RELATION")?;
            check_keys(&foreign_key, &local_key, "RELATION")?;
            builder.ast.relations.push(RelationSpec {
                kind,
                table,
                name,
                foreign_key: foreign_key.0,
                local_key: local_key.0,
                filter,
            });
            Ok(())
        })
    }

    // ==================== aggregates ====================

    /// Exposes `SUM(column)` over the related rows as a projection column.
    pub fn with_sum(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        column: impl Into<String>,
    ) -> Self {
        self.push_aggregate(AggregateFn::Sum, target.into(), foreign_key.into(), local_key.into(), Some(column.into()), no_refine())
    }

    /// As [`QueryBuilder::with_sum`], narrowing the aggregated rows through
    /// `build`.
    pub fn with_sum_with(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        column: impl Into<String>,
        build: impl FnOnce(QueryBuilder) -> QueryBuilder,
    ) -> Self {
        self.push_aggregate(AggregateFn::Sum, target.into(), foreign_key.into(), local_key.into(), Some(column.into()), Some(build))
    }

    /// Exposes `COUNT(*)` over the related rows as a projection column.
    pub fn with_count(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
    ) -> Self {
        self.push_aggregate(AggregateFn::Count, target.into(), foreign_key.into(), local_key.into(), None, no_refine())
    }

    /// As [`QueryBuilder::with_count`], narrowing the counted rows through
    /// `build`.
    pub fn with_count_with(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        build: impl FnOnce(QueryBuilder) -> QueryBuilder,
    ) -> Self {
        self.push_aggregate(AggregateFn::Count, target.into(), foreign_key.into(), local_key.into(), None, Some(build))
    }

    /// Exposes `AVG(column)` over the related rows as a projection column.
    pub fn with_avg(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        column: impl Into<String>,
    ) -> Self {
        self.push_aggregate(AggregateFn::Avg, target.into(), foreign_key.into(), local_key.into(), Some(column.into()), no_refine())
    }

    /// Exposes `MAX(column)` over the related rows as a projection column.
    pub fn with_max(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        column: impl Into<String>,
    ) -> Self {
        self.push_aggregate(AggregateFn::Max, target.into(), foreign_key.into(), local_key.into(), Some(column.into()), no_refine())
    }

    /// Exposes `MIN(column)` over the related rows as a projection column.
    pub fn with_min(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        column: impl Into<String>,
    ) -> Self {
        self.push_aggregate(AggregateFn::Min, target.into(), foreign_key.into(), local_key.into(), Some(column.into()), no_refine())
    }

    /// Exposes a caller-supplied aggregate expression over the related rows.
    /// The target must carry an alias; there is nothing to synthesize one
    /// from.
    pub fn with_custom(
        self,
        target: impl Into<RelationTarget>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        expr: Raw,
    ) -> Self {
        self.push_aggregate(
            AggregateFn::Custom(expr.into_inner()),
            target.into(),
            foreign_key.into(),
            local_key.into(),
            None,
            no_refine(),
        )
    }

    fn push_aggregate<F>(
        self,
        func: AggregateFn,
        target: RelationTarget,
        foreign_key: KeyList,
        local_key: KeyList,
        column: Option<String>,
        build: Option<F>,
    ) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.apply(move |builder| {
            let table = target.table().to_owned();
            validate_ident(&table, "AGGREGATE")?;
            check_keys(&foreign_key, &local_key, "AGGREGATE")?;
            if let Some(column) = &column {
                validate_ident(column, "AGGREGATE")?;
            }
            let alias = match (target.alias(), &func) {
                (Some(alias), _) => {
                    validate_ident(alias, "AGGREGATE")?;
                    alias.to_owned()
                }
                (None, AggregateFn::Count) => format!("{table}_count"),
                (None, AggregateFn::Custom(_)) => {
                    return Err(BrookError::validation(
                        "AGGREGATE",
                        "custom aggregates require an alias",
                    ));
                }
                (None, func) => {
                    let column = column.as_deref().unwrap_or("*");
                    format!("{table}_{column}_{}", func.name())
                }
            };

            // Capture the callback's predicates now; the subquery is built
            // at compile time from plain data.
            let filter = filter_predicates(builder, &table, build)?;
            builder.ast.aggregates.push(AggregateSpec {
                func,
                table,
                foreign_key: foreign_key.0,
                local_key: local_key.0,
                column,
                alias,
                filter,
            });
            Ok(())
        })
    }
}

fn parse_target(target: &RelationTarget, context: &'static str) -> Result<(String, String)> {
    let table = target.table().to_owned();
    validate_ident(&table, context)?;
    let name = match target.alias() {
        Some(alias) => {
            validate_ident(alias, context)?;
            alias.to_owned()
        }
        None => table.clone(),
    };
    Ok((table, name))
}

fn check_keys(foreign_key: &KeyList, local_key: &KeyList, context: &'static str) -> Result<()> {
    if foreign_key.is_empty() || foreign_key.len() != local_key.len() {
        return Err(BrookError::validation(
            context,
            format!(
                "key arity mismatch: {} foreign vs {} local",
                foreign_key.len(),
                local_key.len()
            ),
        ));
    }
    for key in foreign_key.0.iter().chain(&local_key.0) {
        validate_ident(key, context)?;
    }
    Ok(())
}

/// Runs an aggregate registration callback over a throwaway builder and
/// keeps only the predicates it pushed.
fn filter_predicates<F>(
    builder: &QueryBuilder,
    table: &str,
    build: Option<F>,
) -> Result<Vec<Predicate>>
where
    F: FnOnce(QueryBuilder) -> QueryBuilder,
{
    let Some(build) = build else {
        return Ok(Vec::new());
    };
    let shell = QueryBuilder::new(builder.executor.clone(), table.to_owned());
    let refined = build(shell);
    if let Some(err) = refined.err {
        return Err(err);
    }
    Ok(refined.ast.wheres)
}

fn no_refine() -> Option<fn(QueryBuilder) -> QueryBuilder> {
    None
}
