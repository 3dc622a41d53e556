//! The fluent query builder.
//!
//! A builder owns exactly one [`QueryAst`] and a shared executor reference.
//! Chain methods compose the AST; a terminal (`get`, `first`, `value`,
//! `count`, `execute`, `chunk`, `chunk_by_id`) compiles, dispatches, and
//! resets the AST, so a builder is not reusable across terminals; construct
//! a fresh one per query. Builders are cheap to discard and must not be
//! shared between concurrent flows.
//!
//! Chain methods never return `Result`. A validation failure is recorded on
//! the builder and surfaced by the next terminal or [`QueryBuilder::to_sql`]
//! call, always before any SQL is emitted or dispatched.

mod predicates;
mod relations;

use std::sync::Arc;

use brook_core::error::{BrookError, Result};
use brook_core::ident::{validate_direction, validate_ident, validate_page_bound};
use brook_core::{MySqlValue, Query, Raw, Sql, SqlChunk, Token};

use crate::ast::{
    JoinKind, JoinSpec, Operand, Projection, QueryAst, QueryKind,
};
use crate::compile;
use crate::executor::{Executor, MutateOutput};
use crate::hydrate;
use crate::row::Row;

/// Fluent builder for a single MySQL statement.
pub struct QueryBuilder {
    pub(crate) ast: QueryAst,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) err: Option<BrookError>,
}

impl QueryBuilder {
    /// Creates a builder targeting `table`, dispatching through `executor`.
    pub fn new(executor: Arc<dyn Executor>, table: impl Into<String>) -> Self {
        let table = table.into();
        let err = validate_ident(&table, "FROM").err();
        QueryBuilder {
            ast: QueryAst::new(table),
            executor,
            err,
        }
    }

    /// Retargets the builder at another table.
    pub fn from(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.apply(move |builder| {
            validate_ident(&table, "FROM")?;
            builder.ast.table = table;
            Ok(())
        })
    }

    /// Runs `f` against the builder unless an earlier step already failed;
    /// the first failure wins and sticks until a terminal reports it.
    pub(crate) fn apply(mut self, f: impl FnOnce(&mut Self) -> Result<()>) -> Self {
        if self.err.is_none() {
            if let Err(err) = f(&mut self) {
                self.err = Some(err);
            }
        }
        self
    }

    pub(crate) fn ensure(&self) -> Result<()> {
        match &self.err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    // ==================== projection ====================

    /// Narrows the projection to the given columns.
    pub fn select<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply(|builder| {
            for column in columns {
                let column = column.into();
                validate_ident(&column, "SELECT")?;
                builder.ast.projection.push(Projection::Column(column));
            }
            Ok(())
        })
    }

    /// Adds a raw expression to the projection.
    pub fn select_raw(self, expr: Raw) -> Self {
        self.apply(|builder| {
            builder.ast.projection.push(Projection::Raw(expr.into_inner()));
            Ok(())
        })
    }

    /// Makes the SELECT DISTINCT.
    pub fn distinct(self) -> Self {
        self.apply(|builder| {
            builder.ast.distinct = true;
            Ok(())
        })
    }

    // ==================== joins ====================

    /// Adds an INNER JOIN. The ON expression is trusted as-is; never build
    /// it from user input.
    pub fn join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.push_join(table.into(), on.into(), JoinKind::Inner)
    }

    /// Adds a LEFT JOIN.
    pub fn left_join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.push_join(table.into(), on.into(), JoinKind::Left)
    }

    /// Adds a RIGHT JOIN.
    pub fn right_join(self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.push_join(table.into(), on.into(), JoinKind::Right)
    }

    fn push_join(self, table: String, on: String, kind: JoinKind) -> Self {
        self.apply(move |builder| {
            validate_ident(&table, "JOIN")?;
            if on.trim().is_empty() {
                return Err(BrookError::validation("JOIN", "empty ON expression"));
            }
            builder.ast.joins.push(JoinSpec { table, on, kind });
            Ok(())
        })
    }

    // ==================== grouping and ordering ====================

    /// Adds GROUP BY columns.
    pub fn group_by<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply(|builder| {
            for column in columns {
                let column = column.into();
                validate_ident(&column, "GROUP BY")?;
                builder.ast.group_by.push(column);
            }
            Ok(())
        })
    }

    /// Adds an ORDER BY entry; `direction` is `ASC` or `DESC`, any case.
    pub fn order_by(self, column: impl Into<String>, direction: &str) -> Self {
        let column = column.into();
        let direction = direction.to_owned();
        self.apply(move |builder| {
            validate_ident(&column, "ORDER BY")?;
            let direction = validate_direction(&direction, "ORDER BY")?;
            builder.ast.order_by.push((column, direction));
            Ok(())
        })
    }

    /// Caps the row count. Zero is allowed; negative values fail.
    pub fn limit(self, limit: i64) -> Self {
        self.apply(move |builder| {
            builder.ast.limit = Some(validate_page_bound(limit, "LIMIT")?);
            Ok(())
        })
    }

    /// Skips leading rows. Only emitted when a limit is set.
    pub fn offset(self, offset: i64) -> Self {
        self.apply(move |builder| {
            builder.ast.offset = Some(validate_page_bound(offset, "OFFSET")?);
            Ok(())
        })
    }

    // ==================== mutations ====================

    /// Stages an INSERT of one or more rows. Every row must carry the same
    /// set of columns, and every value binds as a parameter; raw markers
    /// are rejected here.
    pub fn insert<I>(self, rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<(String, Operand)>>,
    {
        self.apply(|builder| {
            let rows = rows.into_iter().collect::<Vec<_>>();
            if rows.is_empty() {
                return Err(BrookError::validation("INSERT", "no rows to insert"));
            }
            let mut shaped = Vec::with_capacity(rows.len());
            let mut reference: Option<Vec<String>> = None;
            for row in rows {
                if row.is_empty() {
                    return Err(BrookError::validation("INSERT", "empty row payload"));
                }
                let mut columns = Vec::with_capacity(row.len());
                let mut values = Vec::with_capacity(row.len());
                for (column, value) in row {
                    validate_ident(&column, "INSERT")?;
                    let Operand::Value(value) = value else {
                        return Err(BrookError::validation(
                            "INSERT",
                            format!("raw value for column `{column}`"),
                        ));
                    };
                    columns.push(column.clone());
                    values.push((column, value));
                }
                match &reference {
                    None => {
                        let mut sorted = columns.clone();
                        sorted.sort();
                        reference = Some(sorted);
                    }
                    Some(reference) => {
                        let mut sorted = columns.clone();
                        sorted.sort();
                        if &sorted != reference {
                            return Err(BrookError::validation(
                                "INSERT",
                                "rows differ in column names",
                            ));
                        }
                    }
                }
                shaped.push(values);
            }
            builder.ast.kind = QueryKind::Insert;
            builder.ast.insert_rows = shaped;
            Ok(())
        })
    }

    /// Stages an UPDATE with the given SET assignments. Raw operands render
    /// literally, for formulas like `views = views + 1`.
    pub fn update(self, set: Vec<(String, Operand)>) -> Self {
        self.apply(|builder| {
            if set.is_empty() {
                return Err(BrookError::validation("UPDATE", "no assignments"));
            }
            for (column, _) in &set {
                validate_ident(column, "UPDATE")?;
            }
            builder.ast.kind = QueryKind::Update;
            builder.ast.update_set = set;
            Ok(())
        })
    }

    /// Stages an INSERT ... ON DUPLICATE KEY UPDATE. Both payloads are
    /// required; raw operands in the update clause render literally.
    pub fn upsert(self, row: Vec<(String, Operand)>, update: Vec<(String, Operand)>) -> Self {
        let this = self.insert([row]);
        this.apply(|builder| {
            if update.is_empty() {
                return Err(BrookError::validation("UPSERT", "empty update payload"));
            }
            for (column, _) in &update {
                validate_ident(column, "UPSERT")?;
            }
            builder.ast.kind = QueryKind::Upsert;
            builder.ast.update_set = update;
            Ok(())
        })
    }

    /// Stages a DELETE of the rows matched by the WHERE clause.
    pub fn delete(self) -> Self {
        self.apply(|builder| {
            builder.ast.kind = QueryKind::Delete;
            Ok(())
        })
    }

    // ==================== introspection ====================

    /// Compiles the pending statement without executing it. Idempotent and
    /// side-effect free; the returned [`Query`] carries the SQL text and
    /// the bound parameters in placeholder order.
    pub fn to_sql(&self) -> Result<Query> {
        self.ensure()?;
        Ok(compile::compile(&self.ast)?.query)
    }

    // ==================== terminals ====================

    /// Executes the SELECT and returns all post-processed rows.
    pub async fn get(&mut self) -> Result<Vec<Row>> {
        let result = self.run_select().await;
        self.ast.reset();
        result
    }

    /// Executes the SELECT with `LIMIT 1` and returns the first row.
    pub async fn first(&mut self) -> Result<Option<Row>> {
        if self.err.is_none() {
            self.ast.limit = Some(1);
        }
        let result = self.run_select().await;
        self.ast.reset();
        result.map(|rows| rows.into_iter().next())
    }

    /// Fetches the first row and plucks one scalar column from it.
    pub async fn value(&mut self, column: &str) -> Result<Option<MySqlValue>> {
        Ok(self
            .first()
            .await?
            .and_then(|row| row.value(column).cloned()))
    }

    /// Counts the rows the pending SELECT would return, ignoring ordering
    /// and paging.
    pub async fn count(&mut self) -> Result<u64> {
        let result = self.run_count().await;
        self.ast.reset();
        result
    }

    /// Executes the staged mutation.
    pub async fn execute(&mut self) -> Result<MutateOutput> {
        let result = self.run_execute().await;
        self.ast.reset();
        result
    }

    // ==================== execution internals ====================

    /// Compile, dispatch, post-process. Shared by `get`, `first`, and the
    /// chunk drivers, which manage AST reset themselves.
    pub(crate) async fn run_select(&self) -> Result<Vec<Row>> {
        self.ensure()?;
        if self.ast.kind != QueryKind::Select {
            return Err(BrookError::validation(
                "SELECT",
                "row terminals require a SELECT statement",
            ));
        }
        let compiled = compile::compile(&self.ast)?;
        let output = self
            .executor
            .query(&compiled.query.sql, &compiled.query.params)
            .await?;
        let mut rows = output.rows;

        // Aggregate columns come back from MySQL as decimal text; normalize
        // them before anyone reads them.
        for alias in &compiled.aggregate_aliases {
            for row in rows.iter_mut() {
                if let Some(number) = row.value(alias).and_then(MySqlValue::to_number) {
                    row.set_value(alias.clone(), number);
                }
            }
        }

        hydrate::hydrate_rows(&self.executor, &mut rows, &self.ast.relations).await?;

        for column in &compiled.auto_added {
            for row in rows.iter_mut() {
                row.remove(column);
            }
        }
        Ok(rows)
    }

    async fn run_count(&self) -> Result<u64> {
        self.ensure()?;
        if self.ast.kind != QueryKind::Select {
            return Err(BrookError::validation(
                "COUNT",
                "count requires a SELECT statement",
            ));
        }
        // Wrap the pending query as a derived table so DISTINCT, GROUP BY,
        // and aggregate projections keep their semantics under the count.
        let mut ast = self.ast.clone();
        ast.relations.clear();
        ast.order_by.clear();
        ast.limit = None;
        ast.offset = None;
        let (inner, _) = compile::select_sql(&ast)?;
        let sql = Sql::token(Token::SELECT)
            .push(SqlChunk::raw("COUNT(*)"))
            .push(Token::AS)
            .push(SqlChunk::ident("aggregate"))
            .push(Token::FROM)
            .append(inner.parens())
            .push(SqlChunk::raw("count_sub"));
        let query = sql.to_query();
        let output = self.executor.query(&query.sql, &query.params).await?;
        let count = output
            .rows
            .first()
            .and_then(|row| row.value("aggregate"))
            .and_then(MySqlValue::to_number)
            .and_then(|number| number.as_u64())
            .ok_or_else(|| BrookError::Execution("count query returned no count".into()))?;
        Ok(count)
    }

    async fn run_execute(&self) -> Result<MutateOutput> {
        self.ensure()?;
        if self.ast.kind == QueryKind::Select {
            return Err(BrookError::validation(
                "EXECUTE",
                "execute requires an insert, update, upsert, or delete",
            ));
        }
        let compiled = compile::compile(&self.ast)?;
        self.executor
            .mutate(&compiled.query.sql, &compiled.query.params)
            .await
    }
}
