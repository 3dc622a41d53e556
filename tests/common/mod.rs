//! Shared test harness: a scripted in-memory executor and pool.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use brook::executor::{
    ConnectionPool, Executor, MutateOutput, PoolConnection, QueryOutput,
};
use brook::{BrookError, MySqlValue, Result, Row};

/// One recorded dispatch: the SQL text and its bound parameters.
pub type Statement = (String, Vec<MySqlValue>);

/// Executor that replays scripted result sets and records every statement
/// it sees. Responses are consumed in push order; once the script runs dry,
/// queries return empty result sets.
#[derive(Default)]
pub struct MockExecutor {
    responses: Mutex<VecDeque<QueryOutput>>,
    mutations: Mutex<VecDeque<MutateOutput>>,
    log: Mutex<Vec<Statement>>,
}

impl MockExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(MockExecutor::default())
    }

    /// Scripts the rows for the next query.
    pub fn push_rows(&self, rows: Vec<Row>) {
        let columns = rows
            .first()
            .map(|row| row.columns().map(str::to_owned).collect())
            .unwrap_or_default();
        self.responses
            .lock()
            .unwrap()
            .push_back(QueryOutput { rows, columns });
    }

    /// Scripts the outcome of the next mutation.
    pub fn push_mutation(&self, output: MutateOutput) {
        self.mutations.lock().unwrap().push_back(output);
    }

    /// Everything dispatched so far, in order.
    pub fn statements(&self) -> Vec<Statement> {
        self.log.lock().unwrap().clone()
    }

    /// SQL texts dispatched so far, in order.
    pub fn sql_log(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn query(&self, sql: &str, params: &[MySqlValue]) -> Result<QueryOutput> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_owned(), params.to_vec()));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn mutate(&self, sql: &str, params: &[MySqlValue]) -> Result<MutateOutput> {
        self.log
            .lock()
            .unwrap()
            .push((sql.to_owned(), params.to_vec()));
        Ok(self
            .mutations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

/// Pool of scripted connections for transaction tests. Connection events
/// (acquire, begin, commit, rollback) and statements land in one shared
/// journal so ordering across the scope is observable.
#[derive(Default)]
pub struct MockPool {
    pub journal: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<VecDeque<QueryOutput>>>,
    fail_next_mutation: Arc<Mutex<bool>>,
}

impl MockPool {
    pub fn new() -> Arc<Self> {
        Arc::new(MockPool::default())
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(QueryOutput {
                rows,
                columns: Vec::new(),
            });
    }

    /// Makes the next mutation on any connection fail.
    pub fn fail_next_mutation(&self) {
        *self.fail_next_mutation.lock().unwrap() = true;
    }

    pub fn events(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionPool for MockPool {
    async fn acquire(&self) -> Result<Box<dyn PoolConnection>> {
        self.journal.lock().unwrap().push("acquire".to_owned());
        Ok(Box::new(MockConnection {
            journal: self.journal.clone(),
            responses: self.responses.clone(),
            fail_next_mutation: self.fail_next_mutation.clone(),
        }))
    }
}

struct MockConnection {
    journal: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<VecDeque<QueryOutput>>>,
    fail_next_mutation: Arc<Mutex<bool>>,
}

#[async_trait]
impl PoolConnection for MockConnection {
    async fn query(&mut self, sql: &str, _params: &[MySqlValue]) -> Result<QueryOutput> {
        self.journal.lock().unwrap().push(format!("query: {sql}"));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn mutate(&mut self, sql: &str, _params: &[MySqlValue]) -> Result<MutateOutput> {
        if std::mem::take(&mut *self.fail_next_mutation.lock().unwrap()) {
            self.journal.lock().unwrap().push("mutate: failed".to_owned());
            return Err(BrookError::Execution("deadlock found".into()));
        }
        self.journal.lock().unwrap().push(format!("mutate: {sql}"));
        Ok(MutateOutput::default())
    }

    async fn begin(&mut self) -> Result<()> {
        self.journal.lock().unwrap().push("begin".to_owned());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.journal.lock().unwrap().push("commit".to_owned());
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.journal.lock().unwrap().push("rollback".to_owned());
        Ok(())
    }
}

/// A `users` row in the shape the scenario tests use.
pub fn user_row(id: i64, name: &str, status: &str) -> Row {
    Row::from_pairs([
        ("id", MySqlValue::Int(id)),
        ("name", MySqlValue::Text(name.to_owned())),
        ("status", MySqlValue::Text(status.to_owned())),
    ])
}

/// A `transactions` row keyed by user.
pub fn transaction_row(id: i64, user_id: i64, status: &str, amount: f64) -> Row {
    Row::from_pairs([
        ("id", MySqlValue::Int(id)),
        ("user_id", MySqlValue::Int(user_id)),
        ("status", MySqlValue::Text(status.to_owned())),
        ("amount", MySqlValue::Double(amount)),
    ])
}
