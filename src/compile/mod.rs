//! The SQL compiler: a single walk over the query AST producing a chunked
//! [`Sql`] fragment.
//!
//! Parameters are embedded in the fragment chunks, so the rendered
//! parameter list is in textual placeholder order by construction, nested
//! subqueries included. Aggregate-alias filter rewriting and hydration-key
//! auto-selection both run here, as resolution passes over the finished
//! tree, so they do not depend on builder call order.

mod wheres;

use brook_core::error::{BrookError, Result};
use brook_core::{Query, Sql, SqlChunk, Token};

use crate::ast::{
    AggregateSpec, JoinKind, Operand, Predicate, Projection, QueryAst, QueryKind,
};

pub(crate) use wheres::clause;

/// Compilation output: the rendered query plus the bookkeeping the
/// post-processor needs.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub query: Query,
    /// Aggregate aliases present in the projection, cast to numbers after
    /// execution
    pub aggregate_aliases: Vec<String>,
    /// Columns added for relation matching, stripped from result rows
    pub auto_added: Vec<String>,
}

/// Compiles the AST into SQL text and parameters.
pub fn compile(ast: &QueryAst) -> Result<Compiled> {
    if ast.table.is_empty() {
        return Err(BrookError::Emission("no target table".into()));
    }
    match ast.kind {
        QueryKind::Select => compile_select(ast),
        QueryKind::Insert => plain(insert_sql(ast, false)?),
        QueryKind::Update => plain(update_sql(ast)?),
        QueryKind::Upsert => plain(upsert_sql(ast)?),
        QueryKind::Delete => plain(delete_sql(ast)?),
    }
}

fn plain(sql: Sql) -> Result<Compiled> {
    Ok(Compiled {
        query: sql.to_query(),
        aggregate_aliases: Vec::new(),
        auto_added: Vec::new(),
    })
}

// ==================== SELECT ====================

fn compile_select(ast: &QueryAst) -> Result<Compiled> {
    let (sql, auto_added) = select_sql(ast)?;
    Ok(Compiled {
        query: sql.to_query(),
        aggregate_aliases: ast
            .aggregates
            .iter()
            .map(|agg| agg.alias.clone())
            .collect(),
        auto_added,
    })
}

/// Builds the full SELECT fragment. Also used to splice EXISTS and scalar
/// subqueries, which is why it returns `Sql` rather than rendered text.
pub(crate) fn select_sql(ast: &QueryAst) -> Result<(Sql, Vec<String>)> {
    let mut sql = Sql::token(Token::SELECT);
    if ast.distinct {
        sql = sql.push(Token::DISTINCT);
    }

    let (projection, auto_added) = projection_sql(ast)?;
    sql = sql
        .append(projection)
        .push(Token::FROM)
        .push(SqlChunk::ident(ast.table.clone()));

    for join in &ast.joins {
        let token = match join.kind {
            JoinKind::Inner => Token::INNER_JOIN,
            JoinKind::Left => Token::LEFT_JOIN,
            JoinKind::Right => Token::RIGHT_JOIN,
        };
        sql = sql
            .push(token)
            .push(SqlChunk::ident(join.table.clone()))
            .push(Token::ON)
            .push(SqlChunk::raw(join.on.clone()));
    }

    let where_clause = clause(&ast.wheres, ast, true)?;
    if !where_clause.is_empty() {
        sql = sql.push(Token::WHERE).append(where_clause);
    }

    if !ast.group_by.is_empty() {
        sql = sql.push(Token::GROUP_BY).append(Sql::join(
            ast.group_by.iter().map(|column| Sql::ident(column.clone())),
            Token::COMMA,
        ));
    }

    // HAVING references the projected alias itself; no alias promotion
    let having_clause = clause(&ast.having, ast, false)?;
    if !having_clause.is_empty() {
        sql = sql.push(Token::HAVING).append(having_clause);
    }

    if !ast.order_by.is_empty() {
        sql = sql.push(Token::ORDER_BY).append(Sql::join(
            ast.order_by.iter().map(|(column, direction)| {
                Sql::ident(column.clone()).push(SqlChunk::raw(direction.as_str()))
            }),
            Token::COMMA,
        ));
    }

    if let Some(limit) = ast.limit {
        sql = sql
            .push(Token::LIMIT)
            .push(SqlChunk::raw(limit.to_string()));
        // OFFSET is only meaningful under a LIMIT
        if let Some(offset) = ast.offset {
            sql = sql
                .push(Token::OFFSET)
                .push(SqlChunk::raw(offset.to_string()));
        }
    }

    Ok((sql, auto_added))
}

/// Expands the projection: caller columns first, then any relation keys
/// missing from a narrowed projection, then aggregate scalar subqueries.
fn projection_sql(ast: &QueryAst) -> Result<(Sql, Vec<String>)> {
    let mut entries: Vec<Sql> = Vec::new();
    let mut auto_added = Vec::new();

    if ast.projection.is_empty() {
        if ast.aggregates.is_empty() {
            entries.push(Sql::token(Token::STAR));
        } else {
            // Widen `*` so appended aggregate columns stay unambiguous
            entries.push(Sql::raw(format!("{}.*", ast.table)));
        }
    } else {
        for entry in &ast.projection {
            entries.push(match entry {
                Projection::Column(column) => Sql::ident(column.clone()),
                Projection::Raw(expr) => Sql::raw(expr.clone()),
            });
        }
        // A narrowed projection must still carry the local keys the
        // hydrator matches on; remember them so post-processing can strip
        // them back out.
        for relation in &ast.relations {
            for key in &relation.local_key {
                let bare = bare_column(key);
                if ast.projection.iter().any(|entry| entry.covers(bare)) {
                    continue;
                }
                if auto_added.iter().any(|added| added == bare) {
                    continue;
                }
                entries.push(Sql::ident(format!("{}.{}", ast.table, bare)));
                auto_added.push(bare.to_owned());
            }
        }
    }

    for aggregate in &ast.aggregates {
        let subquery = aggregate_subquery(ast, aggregate)?;
        entries.push(
            subquery
                .parens()
                .push(Token::AS)
                .push(SqlChunk::ident(aggregate.alias.clone())),
        );
    }

    Ok((Sql::join(entries, Token::COMMA), auto_added))
}

pub(crate) fn bare_column(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}

/// Builds the correlated scalar subquery for an aggregate directive:
/// `SELECT <fn> FROM <related> WHERE <correlation> [AND <filter>]`.
pub(crate) fn aggregate_subquery(outer: &QueryAst, spec: &AggregateSpec) -> Result<Sql> {
    let mut sub = QueryAst::new(spec.table.clone());
    sub.projection = vec![Projection::Raw(
        spec.func.expression(spec.column.as_deref()),
    )];
    sub.wheres = correlation(&spec.table, &spec.foreign_key, &outer.table, &spec.local_key);
    sub.wheres.extend(spec.filter.iter().cloned());
    Ok(select_sql(&sub)?.0)
}

/// The paired-key correlation predicates tying a subquery to the outer
/// table: `related.fk_i = outer.lk_i` for each pair.
pub(crate) fn correlation(
    related: &str,
    foreign_key: &[String],
    outer: &str,
    local_key: &[String],
) -> Vec<Predicate> {
    foreign_key
        .iter()
        .zip(local_key)
        .map(|(fk, lk)| Predicate::Cmp {
            column: format!("{related}.{fk}"),
            op: "=".to_owned(),
            value: Operand::Raw(format!("{outer}.{lk}")),
            conn: crate::ast::Conn::And,
        })
        .collect()
}

// ==================== mutations ====================

fn insert_sql(ast: &QueryAst, upsert: bool) -> Result<Sql> {
    let Some(first) = ast.insert_rows.first() else {
        return Err(BrookError::Emission("insert with no rows".into()));
    };
    let columns: Vec<&String> = first.iter().map(|(column, _)| column).collect();

    let mut sql = Sql::token(Token::INSERT_INTO)
        .push(SqlChunk::ident(ast.table.clone()))
        .append(
            Sql::join(
                columns.iter().map(|column| Sql::ident((*column).clone())),
                Token::COMMA,
            )
            .parens(),
        )
        .push(Token::VALUES);

    // Parameters are pushed row-major in the declared column order; rows
    // were checked for a uniform column set at call time.
    let mut groups = Vec::with_capacity(ast.insert_rows.len());
    for row in &ast.insert_rows {
        if row.len() != columns.len() {
            return Err(BrookError::Emission("insert rows differ in shape".into()));
        }
        let mut values = Vec::with_capacity(columns.len());
        for column in &columns {
            let Some((_, value)) = row.iter().find(|(name, _)| name == *column) else {
                return Err(BrookError::Emission(format!(
                    "insert row missing column `{column}`"
                )));
            };
            values.push(Sql::param(value.clone()));
        }
        groups.push(Sql::join(values, Token::COMMA).parens());
    }
    sql = sql.append(Sql::join(groups, Token::COMMA));

    if upsert {
        sql = sql
            .push(Token::ON_DUPLICATE_KEY_UPDATE)
            .append(assignments(&ast.update_set));
    }
    Ok(sql)
}

fn update_sql(ast: &QueryAst) -> Result<Sql> {
    if ast.update_set.is_empty() {
        return Err(BrookError::Emission("update with no assignments".into()));
    }
    let mut sql = Sql::token(Token::UPDATE)
        .push(SqlChunk::ident(ast.table.clone()))
        .push(Token::SET)
        .append(assignments(&ast.update_set));

    let where_clause = clause(&ast.wheres, ast, true)?;
    if !where_clause.is_empty() {
        sql = sql.push(Token::WHERE).append(where_clause);
    }
    Ok(sql)
}

fn upsert_sql(ast: &QueryAst) -> Result<Sql> {
    if ast.update_set.is_empty() {
        return Err(BrookError::Emission("upsert with no update clause".into()));
    }
    insert_sql(ast, true)
}

fn delete_sql(ast: &QueryAst) -> Result<Sql> {
    let mut sql = Sql::token(Token::DELETE_FROM).push(SqlChunk::ident(ast.table.clone()));
    let where_clause = clause(&ast.wheres, ast, true)?;
    if !where_clause.is_empty() {
        sql = sql.push(Token::WHERE).append(where_clause);
    }
    Ok(sql)
}

/// `col = ?` assignments; Raw operands render literally and bind nothing,
/// which is what `col = col + 1` style updates rely on.
fn assignments(set: &[(String, Operand)]) -> Sql {
    Sql::join(
        set.iter().map(|(column, value)| {
            let lhs = Sql::ident(column.clone()).push(Token::EQ);
            match value {
                Operand::Value(value) => lhs.push(SqlChunk::param(value.clone())),
                Operand::Raw(expr) => lhs.push(SqlChunk::raw(expr.clone())),
            }
        }),
        Token::COMMA,
    )
}
