//! Scoped transactions.
//!
//! [`transaction`] pins one pooled connection for the whole scope: BEGIN,
//! run the callback's statements through a transaction-bound executor,
//! then COMMIT on success or ROLLBACK on any propagated failure. The
//! connection returns to the pool on every exit path when the last
//! reference to the scope's executor drops.

use std::future::Future;
use std::sync::Arc;

use brook_core::brook_trace_tx;
use brook_core::error::Result;

use crate::builder::QueryBuilder;
use crate::executor::{ConnectionPool, Executor, TransactionExecutor};

/// Builder factory bound to one in-flight transaction.
///
/// Every builder it hands out shares the pinned connection, so statements
/// are strictly serialized and observe the transaction's isolation.
#[derive(Clone)]
pub struct TransactionScope {
    executor: Arc<TransactionExecutor>,
}

impl TransactionScope {
    /// A builder targeting `table`, bound to this transaction.
    pub fn builder(&self, table: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(self.executor.clone(), table)
    }

    /// The transaction-bound executor itself.
    pub fn executor(&self) -> Arc<dyn Executor> {
        self.executor.clone()
    }
}

/// Runs `scope_fn` inside a transaction.
///
/// The callback's error, or any statement failure inside it, rolls the
/// transaction back and propagates unchanged. A rollback failure is
/// swallowed in favor of the original error.
pub async fn transaction<F, Fut, T>(pool: &Arc<dyn ConnectionPool>, scope_fn: F) -> Result<T>
where
    F: FnOnce(TransactionScope) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut conn = pool.acquire().await?;
    brook_trace_tx!("begin");
    conn.begin().await?;

    let executor = Arc::new(TransactionExecutor::new(conn));
    let scope = TransactionScope {
        executor: executor.clone(),
    };

    match scope_fn(scope).await {
        Ok(value) => {
            executor.commit().await?;
            Ok(value)
        }
        Err(err) => {
            let _ = executor.rollback().await;
            Err(err)
        }
    }
}
