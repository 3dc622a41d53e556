//! Chunked iteration over large result sets.
//!
//! Two strategies with different trade-offs: offset paging re-reads skipped
//! rows on every page and drifts when rows are inserted or deleted
//! mid-iteration; key-based paging needs a strictly increasing key column
//! but seeks directly to each page and stays stable under concurrent
//! writes.

use std::future::Future;

use brook_core::error::{BrookError, Result};
use brook_core::ident::{validate_ident, Direction};

use crate::ast::{Conn, Operand, Predicate};
use crate::builder::QueryBuilder;
use crate::compile::bare_column;
use crate::row::Row;

/// What a chunk callback wants the driver to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFlow {
    /// Fetch the next page
    Continue,
    /// Stop iterating; remaining pages are never fetched
    Stop,
}

impl QueryBuilder {
    /// Feeds the result set to `callback` in pages of `size` rows, paging
    /// by OFFSET. Each page is post-processed (aggregate casts, eager
    /// loading) before the callback sees it. Iteration stops when the
    /// callback returns [`ChunkFlow::Stop`], a short page arrives, or a
    /// page comes back empty.
    pub async fn chunk<F, Fut>(&mut self, size: u64, mut callback: F) -> Result<()>
    where
        F: FnMut(Vec<Row>, u64) -> Fut,
        Fut: Future<Output = Result<ChunkFlow>>,
    {
        let saved_limit = self.ast.limit;
        let saved_offset = self.ast.offset;

        let result = async {
            check_size(size)?;
            let mut page = 0u64;
            loop {
                self.ast.limit = Some(size);
                self.ast.offset = Some(page * size);
                let rows = self.run_select().await?;
                if rows.is_empty() {
                    break;
                }
                let fetched = rows.len() as u64;
                if callback(rows, page).await? == ChunkFlow::Stop {
                    break;
                }
                if fetched < size {
                    break;
                }
                page += 1;
            }
            Ok(())
        }
        .await;

        self.ast.limit = saved_limit;
        self.ast.offset = saved_offset;
        self.ast.reset();
        result
    }

    /// Feeds the result set to `callback` in pages of `size` rows, paging
    /// by a strictly increasing `key` column. After each page the last
    /// row's key becomes the lower bound for the next one; the WHERE
    /// clause is restored to its pre-iteration snapshot each round so the
    /// bound never accumulates. Pass `alias` when the key is projected
    /// under a different result column name.
    pub async fn chunk_by_id<F, Fut>(
        &mut self,
        size: u64,
        mut callback: F,
        key: &str,
        alias: Option<&str>,
    ) -> Result<()>
    where
        F: FnMut(Vec<Row>, u64) -> Fut,
        Fut: Future<Output = Result<ChunkFlow>>,
    {
        let saved_limit = self.ast.limit;
        let saved_order = self.ast.order_by.clone();
        let saved_wheres = self.ast.wheres.clone();

        let result = async {
            check_size(size)?;
            validate_ident(key, "CHUNK")?;
            if let Some(alias) = alias {
                validate_ident(alias, "CHUNK")?;
            }
            let read_column = alias.unwrap_or_else(|| bare_column(key)).to_owned();

            if !self
                .ast
                .order_by
                .iter()
                .any(|(column, _)| column == key)
            {
                self.ast
                    .order_by
                    .push((key.to_owned(), Direction::Asc));
            }

            let mut last_key: Option<brook_core::MySqlValue> = None;
            let mut page = 0u64;
            loop {
                self.ast.wheres = saved_wheres.clone();
                if let Some(last) = &last_key {
                    self.ast.wheres.push(Predicate::Cmp {
                        column: key.to_owned(),
                        op: ">".to_owned(),
                        value: Operand::Value(last.clone()),
                        conn: Conn::And,
                    });
                }
                self.ast.limit = Some(size);

                let rows = self.run_select().await?;
                if rows.is_empty() {
                    break;
                }
                let fetched = rows.len() as u64;
                last_key = Some(
                    rows.last()
                        .and_then(|row| row.value(&read_column))
                        .cloned()
                        .ok_or_else(|| {
                            BrookError::validation(
                                "CHUNK",
                                format!("key column `{read_column}` missing from results"),
                            )
                        })?,
                );
                if callback(rows, page).await? == ChunkFlow::Stop {
                    break;
                }
                if fetched < size {
                    break;
                }
                page += 1;
            }
            Ok(())
        }
        .await;

        self.ast.limit = saved_limit;
        self.ast.order_by = saved_order;
        self.ast.wheres = saved_wheres;
        self.ast.reset();
        result
    }
}

fn check_size(size: u64) -> Result<()> {
    if size == 0 {
        return Err(BrookError::validation("CHUNK", "chunk size must be positive"));
    }
    Ok(())
}
