//! `mysql_async` driver binding.
//!
//! Implements the pool and connection contracts over a `mysql_async::Pool`.
//! Transactions run plain BEGIN/COMMIT/ROLLBACK statements on the pinned
//! connection; the transaction-bound executor already guarantees every
//! statement in the scope uses that connection.

use async_trait::async_trait;

use mysql_async::prelude::Queryable;
use mysql_async::{Opts, OptsBuilder, Params, PoolConstraints, PoolOpts};

use brook_core::error::{BrookError, Result};
use brook_core::MySqlValue;

use crate::executor::{ConnectionPool, MutateOutput, PoolConnection, QueryOutput};
use crate::row::Row;

/// Connection options for [`MySqlPool`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Upper bound on pooled connections
    pub pool_size: usize,
    /// Advisory bound on callers waiting for a connection; enforcement is
    /// up to the driver
    pub queue_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_owned(),
            port: 3306,
            user: "root".to_owned(),
            password: String::new(),
            database: String::new(),
            pool_size: 10,
            queue_limit: 0,
        }
    }
}

/// A `mysql_async`-backed connection pool.
pub struct MySqlPool {
    pool: mysql_async::Pool,
}

impl MySqlPool {
    pub fn new(config: &Config) -> Self {
        let constraints =
            PoolConstraints::new(1, config.pool_size.max(1)).unwrap_or_default();
        let opts: Opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.database.clone()))
            .pool_opts(PoolOpts::default().with_constraints(constraints))
            .into();
        MySqlPool {
            pool: mysql_async::Pool::new(opts),
        }
    }
}

#[async_trait]
impl ConnectionPool for MySqlPool {
    async fn acquire(&self) -> Result<Box<dyn PoolConnection>> {
        let conn = self.pool.get_conn().await.map_err(driver_error)?;
        Ok(Box::new(MySqlConnection { conn }))
    }
}

struct MySqlConnection {
    conn: mysql_async::Conn,
}

#[async_trait]
impl PoolConnection for MySqlConnection {
    async fn query(&mut self, sql: &str, params: &[MySqlValue]) -> Result<QueryOutput> {
        let rows: Vec<mysql_async::Row> = self
            .conn
            .exec(sql, to_params(params))
            .await
            .map_err(driver_error)?;
        let columns = rows
            .first()
            .map(|row| {
                row.columns_ref()
                    .iter()
                    .map(|column| column.name_str().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        let rows = rows.into_iter().map(convert_row).collect();
        Ok(QueryOutput { rows, columns })
    }

    async fn mutate(&mut self, sql: &str, params: &[MySqlValue]) -> Result<MutateOutput> {
        self.conn
            .exec_drop(sql, to_params(params))
            .await
            .map_err(driver_error)?;
        Ok(MutateOutput {
            insert_id: self.conn.last_insert_id(),
            affected_rows: self.conn.affected_rows(),
        })
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn.query_drop("BEGIN").await.map_err(tx_error)
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT").await.map_err(tx_error)
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn.query_drop("ROLLBACK").await.map_err(tx_error)
    }
}

fn driver_error(err: mysql_async::Error) -> BrookError {
    BrookError::Execution(err.to_string())
}

fn tx_error(err: mysql_async::Error) -> BrookError {
    BrookError::Transaction(err.to_string())
}

fn to_params(params: &[MySqlValue]) -> Params {
    if params.is_empty() {
        return Params::Empty;
    }
    Params::Positional(params.iter().map(to_driver_value).collect())
}

fn to_driver_value(value: &MySqlValue) -> mysql_async::Value {
    match value {
        MySqlValue::Null => mysql_async::Value::NULL,
        MySqlValue::Int(int) => mysql_async::Value::Int(*int),
        MySqlValue::UInt(int) => mysql_async::Value::UInt(*int),
        MySqlValue::Double(double) => mysql_async::Value::Double(*double),
        MySqlValue::Text(text) => mysql_async::Value::Bytes(text.clone().into_bytes()),
        MySqlValue::Bytes(bytes) => mysql_async::Value::Bytes(bytes.clone()),
    }
}

fn from_driver_value(value: mysql_async::Value) -> MySqlValue {
    match value {
        mysql_async::Value::NULL => MySqlValue::Null,
        mysql_async::Value::Int(int) => MySqlValue::Int(int),
        mysql_async::Value::UInt(int) => MySqlValue::UInt(int),
        mysql_async::Value::Float(float) => MySqlValue::Double(float as f64),
        mysql_async::Value::Double(double) => MySqlValue::Double(double),
        mysql_async::Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => MySqlValue::Text(text),
            Err(err) => MySqlValue::Bytes(err.into_bytes()),
        },
        // Temporal values surface as their SQL text form
        other => MySqlValue::Text(other.as_sql(true).trim_matches('\'').to_owned()),
    }
}

fn convert_row(row: mysql_async::Row) -> Row {
    let columns = row.columns();
    let values = row.unwrap();
    let mut out = Row::new();
    for (column, value) in columns.iter().zip(values) {
        out.set_value(column.name_str().into_owned(), from_driver_value(value));
    }
    out
}
