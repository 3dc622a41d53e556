//! Predicate-appending methods: comparisons, IN, BETWEEN, NULL checks,
//! LIKE, groups, correlated existence, and aggregate subquery comparisons.

use brook_core::error::{BrookError, Result};
use brook_core::ident::{like_pattern, validate_ident, validate_operator, LikeSide, OperatorSet};
use brook_core::MySqlValue;

use crate::ast::{
    Conn, IntoOperand, KeyList, Operand, Predicate, Projection, QueryAst, QueryKind,
};
use crate::compile::correlation;

use super::QueryBuilder;

impl QueryBuilder {
    // ==================== comparisons ====================

    /// `column = value`. Shorthand for `where_op(column, "=", value)`.
    pub fn where_eq(self, column: impl Into<String>, value: impl IntoOperand) -> Self {
        self.push_cmp(column.into(), "=".to_owned(), value.into_operand(), Conn::And)
    }

    /// OR-joined `column = value`.
    pub fn or_where_eq(self, column: impl Into<String>, value: impl IntoOperand) -> Self {
        self.push_cmp(column.into(), "=".to_owned(), value.into_operand(), Conn::Or)
    }

    /// `column op value` with an explicit operator.
    pub fn where_op(
        self,
        column: impl Into<String>,
        op: impl Into<String>,
        value: impl IntoOperand,
    ) -> Self {
        self.push_cmp(column.into(), op.into(), value.into_operand(), Conn::And)
    }

    /// OR-joined `column op value`.
    pub fn or_where_op(
        self,
        column: impl Into<String>,
        op: impl Into<String>,
        value: impl IntoOperand,
    ) -> Self {
        self.push_cmp(column.into(), op.into(), value.into_operand(), Conn::Or)
    }

    fn push_cmp(self, column: String, op: String, value: Operand, conn: Conn) -> Self {
        self.apply(move |builder| {
            validate_ident(&column, "WHERE")?;
            let op = validate_operator(&op, OperatorSet::Comparison, "WHERE")?;
            if value.is_null() && !matches!(op.as_str(), "IS" | "IS NOT") {
                return Err(BrookError::validation(
                    "WHERE",
                    format!("NULL requires IS or IS NOT, got `{op}`"),
                ));
            }
            builder
                .ast
                .wheres
                .push(Predicate::Cmp { column, op, value, conn });
            Ok(())
        })
    }

    /// `column IS NULL`.
    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.push_cmp(
            column.into(),
            "IS".to_owned(),
            Operand::Value(MySqlValue::Null),
            Conn::And,
        )
    }

    /// `column IS NOT NULL`.
    pub fn where_not_null(self, column: impl Into<String>) -> Self {
        self.push_cmp(
            column.into(),
            "IS NOT".to_owned(),
            Operand::Value(MySqlValue::Null),
            Conn::And,
        )
    }

    /// OR-joined `column IS NULL`.
    pub fn or_where_null(self, column: impl Into<String>) -> Self {
        self.push_cmp(
            column.into(),
            "IS".to_owned(),
            Operand::Value(MySqlValue::Null),
            Conn::Or,
        )
    }

    /// OR-joined `column IS NOT NULL`.
    pub fn or_where_not_null(self, column: impl Into<String>) -> Self {
        self.push_cmp(
            column.into(),
            "IS NOT".to_owned(),
            Operand::Value(MySqlValue::Null),
            Conn::Or,
        )
    }

    /// Column-to-column comparison: `lhs op rhs` with both sides validated
    /// as identifiers and the restricted operator set.
    pub fn where_column(
        self,
        lhs: impl Into<String>,
        op: impl Into<String>,
        rhs: impl Into<String>,
    ) -> Self {
        let (lhs, op, rhs) = (lhs.into(), op.into(), rhs.into());
        self.apply(move |builder| {
            validate_ident(&lhs, "WHERE")?;
            validate_ident(&rhs, "WHERE")?;
            let op = validate_operator(&op, OperatorSet::Column, "WHERE")?;
            builder.ast.wheres.push(Predicate::Cmp {
                column: lhs,
                op,
                value: Operand::Raw(rhs),
                conn: Conn::And,
            });
            Ok(())
        })
    }

    // ==================== IN / BETWEEN ====================

    /// `column IN (...)`. An empty list can never match and compiles to the
    /// always-false `1 = 0`.
    pub fn where_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<MySqlValue>,
    {
        self.push_in(column.into(), collect_values(values), false, Conn::And)
    }

    /// `column NOT IN (...)`. An empty list excludes nothing and compiles
    /// to nothing at all.
    pub fn where_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<MySqlValue>,
    {
        self.push_in(column.into(), collect_values(values), true, Conn::And)
    }

    /// OR-joined `column IN (...)`.
    pub fn or_where_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<MySqlValue>,
    {
        self.push_in(column.into(), collect_values(values), false, Conn::Or)
    }

    /// OR-joined `column NOT IN (...)`.
    pub fn or_where_not_in<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<MySqlValue>,
    {
        self.push_in(column.into(), collect_values(values), true, Conn::Or)
    }

    fn push_in(self, column: String, values: Vec<MySqlValue>, negated: bool, conn: Conn) -> Self {
        self.apply(move |builder| {
            validate_ident(&column, "WHERE")?;
            builder.ast.wheres.push(Predicate::In {
                column,
                values,
                negated,
                conn,
            });
            Ok(())
        })
    }

    /// `column BETWEEN lo AND hi`.
    pub fn where_between(
        self,
        column: impl Into<String>,
        lo: impl Into<MySqlValue>,
        hi: impl Into<MySqlValue>,
    ) -> Self {
        self.push_between(column.into(), lo.into(), hi.into(), false, Conn::And)
    }

    /// `column NOT BETWEEN lo AND hi`.
    pub fn where_not_between(
        self,
        column: impl Into<String>,
        lo: impl Into<MySqlValue>,
        hi: impl Into<MySqlValue>,
    ) -> Self {
        self.push_between(column.into(), lo.into(), hi.into(), true, Conn::And)
    }

    /// OR-joined `column BETWEEN lo AND hi`.
    pub fn or_where_between(
        self,
        column: impl Into<String>,
        lo: impl Into<MySqlValue>,
        hi: impl Into<MySqlValue>,
    ) -> Self {
        self.push_between(column.into(), lo.into(), hi.into(), false, Conn::Or)
    }

    /// OR-joined `column NOT BETWEEN lo AND hi`.
    pub fn or_where_not_between(
        self,
        column: impl Into<String>,
        lo: impl Into<MySqlValue>,
        hi: impl Into<MySqlValue>,
    ) -> Self {
        self.push_between(column.into(), lo.into(), hi.into(), true, Conn::Or)
    }

    fn push_between(
        self,
        column: String,
        lo: MySqlValue,
        hi: MySqlValue,
        negated: bool,
        conn: Conn,
    ) -> Self {
        self.apply(move |builder| {
            validate_ident(&column, "WHERE")?;
            builder.ast.wheres.push(Predicate::Between {
                column,
                lo,
                hi,
                negated,
                conn,
            });
            Ok(())
        })
    }

    // ==================== LIKE and search ====================

    /// `column LIKE pattern`, with `%`, `_`, and `\` escaped in `value`
    /// before wrapping per `side`.
    pub fn like(self, column: impl Into<String>, value: &str, side: LikeSide) -> Self {
        self.push_like(column.into(), like_pattern(value, side), Conn::And)
    }

    /// OR-joined LIKE.
    pub fn or_like(self, column: impl Into<String>, value: &str, side: LikeSide) -> Self {
        self.push_like(column.into(), like_pattern(value, side), Conn::Or)
    }

    fn push_like(self, column: String, pattern: String, conn: Conn) -> Self {
        self.apply(move |builder| {
            validate_ident(&column, "SEARCH")?;
            builder
                .ast
                .wheres
                .push(Predicate::Like { column, pattern, conn });
            Ok(())
        })
    }

    /// Matches `value` against any of `columns`: one grouped LIKE per
    /// column, OR-joined among themselves, AND-joined to prior context.
    pub fn search<I, S>(self, columns: I, value: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_search(columns, value, Conn::And)
    }

    /// As [`QueryBuilder::search`], OR-joined to prior context.
    pub fn or_search<I, S>(self, columns: I, value: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_search(columns, value, Conn::Or)
    }

    fn push_search<I, S>(self, columns: I, value: &str, conn: Conn) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern = like_pattern(value, LikeSide::Both);
        self.apply(move |builder| {
            let columns = columns
                .into_iter()
                .map(Into::into)
                .collect::<Vec<String>>();
            if columns.is_empty() {
                return Err(BrookError::validation("SEARCH", "no columns to search"));
            }
            for column in &columns {
                validate_ident(column, "SEARCH")?;
            }
            builder.ast.wheres.push(Predicate::GroupStart { conn });
            for column in columns {
                builder.ast.wheres.push(Predicate::Like {
                    column,
                    pattern: pattern.clone(),
                    conn: Conn::Or,
                });
            }
            builder.ast.wheres.push(Predicate::GroupEnd);
            Ok(())
        })
    }

    // ==================== groups ====================

    /// Wraps whatever `build` pushes in parentheses, AND-joined to prior
    /// context. Groups nest to arbitrary depth; an empty group vanishes.
    pub fn group(self, build: impl FnOnce(Self) -> Self) -> Self {
        self.push_group(build, Conn::And)
    }

    /// As [`QueryBuilder::group`], OR-joined to prior context.
    pub fn or_group(self, build: impl FnOnce(Self) -> Self) -> Self {
        self.push_group(build, Conn::Or)
    }

    fn push_group(mut self, build: impl FnOnce(Self) -> Self, conn: Conn) -> Self {
        if self.err.is_some() {
            return self;
        }
        self.ast.wheres.push(Predicate::GroupStart { conn });
        let mut built = build(self);
        built.ast.wheres.push(Predicate::GroupEnd);
        built
    }

    // ==================== correlated existence ====================

    /// `EXISTS (SELECT 1 FROM related WHERE related.fk = this.lk)`.
    /// Composite keys pair positionally and must be the same length.
    pub fn where_has(
        self,
        related: impl Into<String>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
    ) -> Self {
        self.push_exists(related.into(), foreign_key.into(), local_key.into(), no_filter(), false, Conn::And)
    }

    /// As [`QueryBuilder::where_has`], refining the subquery through `build`.
    pub fn where_has_with(
        self,
        related: impl Into<String>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        build: impl FnOnce(Self) -> Self,
    ) -> Self {
        self.push_exists(related.into(), foreign_key.into(), local_key.into(), Some(build), false, Conn::And)
    }

    /// OR-joined EXISTS.
    pub fn or_where_has(
        self,
        related: impl Into<String>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
    ) -> Self {
        self.push_exists(related.into(), foreign_key.into(), local_key.into(), no_filter(), false, Conn::Or)
    }

    /// OR-joined EXISTS with a refining callback.
    pub fn or_where_has_with(
        self,
        related: impl Into<String>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        build: impl FnOnce(Self) -> Self,
    ) -> Self {
        self.push_exists(related.into(), foreign_key.into(), local_key.into(), Some(build), false, Conn::Or)
    }

    /// `NOT EXISTS (...)`.
    pub fn where_doesnt_have(
        self,
        related: impl Into<String>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
    ) -> Self {
        self.push_exists(related.into(), foreign_key.into(), local_key.into(), no_filter(), true, Conn::And)
    }

    /// NOT EXISTS with a refining callback.
    pub fn where_doesnt_have_with(
        self,
        related: impl Into<String>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        build: impl FnOnce(Self) -> Self,
    ) -> Self {
        self.push_exists(related.into(), foreign_key.into(), local_key.into(), Some(build), true, Conn::And)
    }

    /// OR-joined NOT EXISTS.
    pub fn or_where_doesnt_have(
        self,
        related: impl Into<String>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
    ) -> Self {
        self.push_exists(related.into(), foreign_key.into(), local_key.into(), no_filter(), true, Conn::Or)
    }

    /// OR-joined NOT EXISTS with a refining callback.
    pub fn or_where_doesnt_have_with(
        self,
        related: impl Into<String>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        build: impl FnOnce(Self) -> Self,
    ) -> Self {
        self.push_exists(related.into(), foreign_key.into(), local_key.into(), Some(build), true, Conn::Or)
    }

    fn push_exists<F>(
        self,
        related: String,
        foreign_key: KeyList,
        local_key: KeyList,
        build: Option<F>,
        negated: bool,
        conn: Conn,
    ) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.apply(move |builder| {
            let mut sub = builder.correlated_sub(&related, &foreign_key, &local_key, "WHERE")?;
            sub.projection = vec![Projection::Raw("1".to_owned())];
            let sub = builder.refine_sub(sub, build)?;
            builder.ast.wheres.push(Predicate::Exists {
                negated,
                conn,
                query: Box::new(sub),
            });
            Ok(())
        })
    }

    /// Relationship count shorthand. `>= 1` without a callback degenerates
    /// to a plain EXISTS; anything else compares `COUNT(*)` against `n`.
    pub fn has(
        self,
        related: impl Into<String>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        op: impl Into<String>,
        n: u64,
    ) -> Self {
        let op = op.into();
        if op == ">=" && n == 1 {
            return self.where_has(related, foreign_key, local_key);
        }
        self.push_count_cmp(related.into(), foreign_key.into(), local_key.into(), op, n, no_filter())
    }

    /// As [`QueryBuilder::has`], refining the counting subquery through
    /// `build`. The callback always forces the COUNT(*) form.
    pub fn has_with(
        self,
        related: impl Into<String>,
        foreign_key: impl Into<KeyList>,
        local_key: impl Into<KeyList>,
        op: impl Into<String>,
        n: u64,
        build: impl FnOnce(Self) -> Self,
    ) -> Self {
        self.push_count_cmp(related.into(), foreign_key.into(), local_key.into(), op.into(), n, Some(build))
    }

    fn push_count_cmp<F>(
        self,
        related: String,
        foreign_key: KeyList,
        local_key: KeyList,
        op: String,
        n: u64,
        build: Option<F>,
    ) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        self.apply(move |builder| {
            let op = validate_operator(&op, OperatorSet::Column, "WHERE")?;
            let mut sub = builder.correlated_sub(&related, &foreign_key, &local_key, "WHERE")?;
            sub.projection = vec![Projection::Raw("COUNT(*)".to_owned())];
            let sub = builder.refine_sub(sub, build)?;
            builder.ast.wheres.push(Predicate::AggregateCmp {
                query: Box::new(sub),
                op,
                value: MySqlValue::UInt(n),
                conn: Conn::And,
            });
            Ok(())
        })
    }

    // ==================== HAVING ====================

    /// `HAVING column op value`. HAVING supports plain comparisons only.
    pub fn having(
        self,
        column: impl Into<String>,
        op: impl Into<String>,
        value: impl IntoOperand,
    ) -> Self {
        let (column, op, value) = (column.into(), op.into(), value.into_operand());
        self.apply(move |builder| {
            validate_ident(&column, "HAVING")?;
            let op = validate_operator(&op, OperatorSet::Comparison, "HAVING")?;
            builder.ast.having.push(Predicate::Cmp {
                column,
                op,
                value,
                conn: Conn::And,
            });
            Ok(())
        })
    }

    // ==================== shared sub-builder plumbing ====================

    /// A sub-AST targeting `related`, correlated to this builder's table by
    /// the paired keys.
    pub(crate) fn correlated_sub(
        &self,
        related: &str,
        foreign_key: &KeyList,
        local_key: &KeyList,
        context: &'static str,
    ) -> Result<QueryAst> {
        validate_ident(related, context)?;
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
        if self.ast.table.is_empty() {
            return Err(BrookError::validation(context, "no target table"));
        }
        let mut sub = QueryAst::new(related);
        sub.wheres = correlation(related, &foreign_key.0, &self.ast.table, &local_key.0);
        Ok(sub)
    }

    /// Runs an optional callback over a throwaway builder wrapping `sub`,
    /// propagating any validation failure it records.
    pub(crate) fn refine_sub<F>(&self, sub: QueryAst, build: Option<F>) -> Result<QueryAst>
    where
        F: FnOnce(Self) -> Self,
    {
        let Some(build) = build else { return Ok(sub) };
        let shell = QueryBuilder {
            ast: sub,
            executor: self.executor.clone(),
            err: None,
        };
        let refined = build(shell);
        if let Some(err) = refined.err {
            return Err(err);
        }
        if refined.ast.kind != QueryKind::Select {
            return Err(BrookError::validation(
                "WHERE",
                "subquery callbacks may only refine the SELECT",
            ));
        }
        Ok(refined.ast)
    }
}

fn collect_values<I, V>(values: I) -> Vec<MySqlValue>
where
    I: IntoIterator<Item = V>,
    V: Into<MySqlValue>,
{
    values.into_iter().map(Into::into).collect()
}

/// The explicit no-callback marker for the optional-callback internals.
fn no_filter() -> Option<fn(QueryBuilder) -> QueryBuilder> {
    None
}
