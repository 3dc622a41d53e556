//! WHERE / HAVING emission.
//!
//! Connective placement is driven by a stack of per-scope counters: a
//! GroupStart pushes a fresh counter, a GroupEnd pops it, and a node only
//! gets its connective prepended when the counter of the scope it lands in
//! is positive. Joining nodes with a flat "AND" would misplace connectives
//! around groups.

use brook_core::error::Result;
use brook_core::{Sql, SqlChunk, Token};

use crate::ast::{Conn, Operand, Predicate, QueryAst};

use super::{aggregate_subquery, select_sql};

impl Conn {
    const fn token(self) -> Token {
        match self {
            Conn::And => Token::AND,
            Conn::Or => Token::OR,
        }
    }
}

/// Emits a predicate list. Returns an empty fragment when nothing renders
/// (no nodes, or only no-op nodes such as empty NOT IN).
///
/// `promote_aliases` controls the aggregate-alias rewrite and is set only
/// for WHERE: HAVING runs after the projection and references the
/// SELECT-list alias directly, so re-embedding the subquery there would be
/// both redundant and wrong.
pub(crate) fn clause(nodes: &[Predicate], outer: &QueryAst, promote_aliases: bool) -> Result<Sql> {
    let mut sql = Sql::empty();
    let mut counters: Vec<usize> = vec![0];
    let mut index = 0;

    while index < nodes.len() {
        let node = &nodes[index];
        match node {
            Predicate::GroupStart { conn } => {
                if let Some(end) = empty_group_end(nodes, index) {
                    // A callback that pushed nothing leaves an empty pair
                    // behind; emitting it would produce `()`
                    index = end + 1;
                    continue;
                }
                sql = connective(sql, &mut counters, *conn);
                sql = sql.push(Token::LPAREN);
                counters.push(0);
            }
            Predicate::GroupEnd => {
                counters.pop();
                sql = sql.push(Token::RPAREN);
            }
            Predicate::In {
                values, negated, ..
            } if values.is_empty() && *negated => {
                // NOT IN () matches everything: emit nothing
            }
            _ => {
                sql = connective(sql, &mut counters, node.conn());
                sql = sql.append(emit(node, outer, promote_aliases)?);
            }
        }
        index += 1;
    }
    Ok(sql)
}

fn connective(sql: Sql, counters: &mut [usize], conn: Conn) -> Sql {
    let counter = counters
        .last_mut()
        .expect("scope counter stack never drains below its root");
    let sql = if *counter > 0 {
        sql.push(conn.token())
    } else {
        sql
    };
    *counter += 1;
    sql
}

/// Index of the GroupEnd closing an empty group starting at `start`,
/// skipping nested empty groups, or `None` when the group has content.
fn empty_group_end(nodes: &[Predicate], start: usize) -> Option<usize> {
    let mut index = start + 1;
    while let Some(Predicate::GroupStart { .. }) = nodes.get(index) {
        index = empty_group_end(nodes, index)? + 1;
    }
    match nodes.get(index) {
        Some(Predicate::GroupEnd) => Some(index),
        _ => None,
    }
}

fn emit(node: &Predicate, outer: &QueryAst, promote_aliases: bool) -> Result<Sql> {
    match node {
        Predicate::Cmp {
            column, op, value, ..
        } => emit_cmp(column, op, value, outer, promote_aliases),

        Predicate::In {
            column,
            values,
            negated,
            ..
        } => {
            if values.is_empty() {
                // IN () can never match; emit the always-false sentinel
                return Ok(Sql::raw("1 = 0"));
            }
            let mut sql = Sql::ident(column.clone());
            if *negated {
                sql = sql.push(Token::NOT);
            }
            Ok(sql.push(Token::IN).append(
                Sql::join(
                    values.iter().map(|value| Sql::param(value.clone())),
                    Token::COMMA,
                )
                .parens(),
            ))
        }

        Predicate::Between {
            column,
            lo,
            hi,
            negated,
            ..
        } => {
            let mut sql = Sql::ident(column.clone());
            if *negated {
                sql = sql.push(Token::NOT);
            }
            Ok(sql
                .push(Token::BETWEEN)
                .push(SqlChunk::param(lo.clone()))
                .push(Token::AND)
                .push(SqlChunk::param(hi.clone())))
        }

        Predicate::Like {
            column, pattern, ..
        } => Ok(Sql::ident(column.clone())
            .push(Token::LIKE)
            .push(SqlChunk::param(pattern.clone()))),

        Predicate::Exists { negated, query, .. } => {
            let (subquery, _) = select_sql(query)?;
            let mut sql = Sql::empty();
            if *negated {
                sql = sql.push(Token::NOT);
            }
            Ok(sql.push(Token::EXISTS).append(subquery.parens()))
        }

        Predicate::AggregateCmp {
            query, op, value, ..
        } => {
            let (subquery, _) = select_sql(query)?;
            Ok(subquery
                .parens()
                .push(SqlChunk::raw(op.clone()))
                .push(SqlChunk::param(value.clone())))
        }

        Predicate::Fragment { sql, .. } => Ok(sql.clone()),

        Predicate::GroupStart { .. } | Predicate::GroupEnd => {
            unreachable!("group markers are handled by the clause walker")
        }
    }
}

fn emit_cmp(
    column: &str,
    op: &str,
    value: &Operand,
    outer: &QueryAst,
    promote_aliases: bool,
) -> Result<Sql> {
    // A comparison against a registered aggregate alias is promoted into a
    // correlated scalar subquery comparison. Resolving it here, over the
    // finished tree, makes registration order irrelevant.
    if promote_aliases {
        if let Operand::Value(scalar) = value {
            if let Some(aggregate) = outer
                .aggregates
                .iter()
                .find(|aggregate| aggregate.alias == column)
            {
                let subquery = aggregate_subquery(outer, aggregate)?;
                let lhs = subquery.parens().push(SqlChunk::raw(op.to_owned()));
                // IS / IS NOT takes the NULL keyword, never a placeholder
                return Ok(if scalar.is_null() {
                    lhs.push(Token::NULL)
                } else {
                    lhs.push(SqlChunk::param(scalar.clone()))
                });
            }
        }
    }

    let sql = Sql::ident(column.to_owned()).push(SqlChunk::raw(op.to_owned()));
    Ok(match value {
        // IS / IS NOT NULL renders the keyword, binds nothing
        Operand::Value(scalar) if scalar.is_null() => sql.push(Token::NULL),
        Operand::Value(scalar) => sql.push(SqlChunk::param(scalar.clone())),
        Operand::Raw(expr) => sql.push(SqlChunk::raw(expr.clone())),
    })
}
