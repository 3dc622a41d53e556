//! The executor boundary: the abstract contract compiled queries are
//! dispatched through, plus the two concrete dispatch modes.
//!
//! The compiler never touches a connection pool directly; terminals hold an
//! `Arc<dyn Executor>` and nothing else. The pool-backed adapter acquires a
//! connection per statement (autocommit), the transaction-bound adapter
//! pins one connection and serializes statements on it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use brook_core::error::Result;
use brook_core::{brook_trace_query, brook_trace_tx, MySqlValue};

use crate::row::Row;

/// Result of a SELECT dispatch.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    /// Result-set column names, in select order
    pub columns: Vec<String>,
}

/// Result of an INSERT/UPDATE/UPSERT/DELETE dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutateOutput {
    pub insert_id: Option<u64>,
    pub affected_rows: u64,
}

/// Dispatch target for compiled queries.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs a SELECT and returns its rows.
    async fn query(&self, sql: &str, params: &[MySqlValue]) -> Result<QueryOutput>;

    /// Runs a mutation and returns its outcome.
    async fn mutate(&self, sql: &str, params: &[MySqlValue]) -> Result<MutateOutput>;
}

/// Source of connections for the pool-backed executor and the transaction
/// coordinator. Process-wide; mutated only through acquire and connection
/// drop.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Checks a connection out of the pool. Dropping the box returns it.
    async fn acquire(&self) -> Result<Box<dyn PoolConnection>>;
}

/// A checked-out connection.
#[async_trait]
pub trait PoolConnection: Send {
    async fn query(&mut self, sql: &str, params: &[MySqlValue]) -> Result<QueryOutput>;

    async fn mutate(&mut self, sql: &str, params: &[MySqlValue]) -> Result<MutateOutput>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// Autocommit dispatch: one pooled connection per statement, released on
/// completion.
pub struct PoolExecutor {
    pool: Arc<dyn ConnectionPool>,
}

impl PoolExecutor {
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        PoolExecutor { pool }
    }
}

#[async_trait]
impl Executor for PoolExecutor {
    async fn query(&self, sql: &str, params: &[MySqlValue]) -> Result<QueryOutput> {
        brook_trace_query!(sql, params.len());
        let mut conn = self.pool.acquire().await?;
        conn.query(sql, params).await
    }

    async fn mutate(&self, sql: &str, params: &[MySqlValue]) -> Result<MutateOutput> {
        brook_trace_query!(sql, params.len());
        let mut conn = self.pool.acquire().await?;
        conn.mutate(sql, params).await
    }
}

/// Transaction-bound dispatch: every statement runs on the pinned
/// connection, strictly serialized by the mutex.
pub struct TransactionExecutor {
    conn: Mutex<Box<dyn PoolConnection>>,
}

impl TransactionExecutor {
    pub(crate) fn new(conn: Box<dyn PoolConnection>) -> Self {
        TransactionExecutor {
            conn: Mutex::new(conn),
        }
    }

    pub(crate) async fn commit(&self) -> Result<()> {
        brook_trace_tx!("commit");
        self.conn.lock().await.commit().await
    }

    pub(crate) async fn rollback(&self) -> Result<()> {
        brook_trace_tx!("rollback");
        self.conn.lock().await.rollback().await
    }
}

#[async_trait]
impl Executor for TransactionExecutor {
    async fn query(&self, sql: &str, params: &[MySqlValue]) -> Result<QueryOutput> {
        brook_trace_query!(sql, params.len());
        self.conn.lock().await.query(sql, params).await
    }

    async fn mutate(&self, sql: &str, params: &[MySqlValue]) -> Result<MutateOutput> {
        brook_trace_query!(sql, params.len());
        self.conn.lock().await.mutate(sql, params).await
    }
}
