use std::future::Future;
use std::sync::Arc;

use brook_core::error::Result;

use crate::builder::QueryBuilder;
use crate::executor::{ConnectionPool, Executor, PoolExecutor};
use crate::transaction::{transaction, TransactionScope};

/// Entry point: a connection pool plus the default autocommit executor.
///
/// Cheap to clone; all clones share the same pool.
#[derive(Clone)]
pub struct Brook {
    pool: Arc<dyn ConnectionPool>,
    executor: Arc<dyn Executor>,
}

impl Brook {
    /// Wraps a connection pool.
    pub fn new(pool: Arc<dyn ConnectionPool>) -> Self {
        let executor: Arc<dyn Executor> = Arc::new(PoolExecutor::new(pool.clone()));
        Brook { pool, executor }
    }

    /// Connects to MySQL with the given options.
    #[cfg(feature = "mysql-async")]
    pub fn connect(config: crate::driver::Config) -> Self {
        Brook::new(Arc::new(crate::driver::MySqlPool::new(&config)))
    }

    /// A builder targeting `table`, dispatching in autocommit mode.
    pub fn builder(&self, table: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(self.executor.clone(), table)
    }

    /// The default executor.
    pub fn executor(&self) -> Arc<dyn Executor> {
        self.executor.clone()
    }

    /// Runs `scope_fn` inside a transaction; see [`transaction`].
    pub async fn transaction<F, Fut, T>(&self, scope_fn: F) -> Result<T>
    where
        F: FnOnce(TransactionScope) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        transaction(&self.pool, scope_fn).await
    }
}
