//! # Brook
//!
//! A fluent, runtime-typed SQL query builder for MySQL, with parameterized
//! compilation, eager relation loading, aggregate subqueries, chunked
//! iteration, and scoped transactions.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brook::prelude::*;
//!
//! let db = Brook::connect(Config::default());
//!
//! let users = db
//!     .builder("users")
//!     .select(["id", "name"])
//!     .where_eq("status", "active")
//!     .with_many("transactions", "user_id", "id")
//!     .order_by("name", "ASC")
//!     .limit(50)
//!     .get()
//!     .await?;
//! ```
//!
//! ## Design
//!
//! Chain methods append to an in-memory query AST; terminals compile it in
//! a single walk into SQL text plus a parameter list in placeholder order,
//! dispatch through an abstract [`executor::Executor`], post-process the
//! rows, and reset the AST. Structural inputs (tables, columns, operators,
//! directions) are validated up front; every scalar value binds as a `?`
//! parameter unless explicitly wrapped in a [`Raw`] marker.
//!
//! A chain method never returns `Result`: the first validation failure is
//! recorded on the builder and reported by the next terminal or
//! [`builder::QueryBuilder::to_sql`] call, before any SQL is emitted.
//!
//! Drivers are feature-gated; enable `mysql-async` for the bundled
//! `mysql_async` binding, or implement [`executor::ConnectionPool`] for
//! anything else.

#[macro_use]
mod macros;

pub mod ast;
pub mod builder;
pub mod chunk;
pub mod compile;
pub mod driver;
pub mod executor;
mod hydrate;
pub mod row;
pub mod transaction;

mod brook;

pub use brook::Brook;

// Core re-exports
pub use brook_core::error::{BrookError, Result};
pub use brook_core::ident::{Direction, LikeSide};
pub use brook_core::{raw, MySqlValue, Query, Raw};

pub use builder::QueryBuilder;
pub use chunk::ChunkFlow;
pub use executor::{
    ConnectionPool, Executor, MutateOutput, PoolConnection, PoolExecutor, QueryOutput,
};
pub use row::{Cell, Row};
pub use transaction::{transaction, TransactionScope};

/// One-stop imports for builder call sites.
pub mod prelude {
    pub use crate::ast::{IntoOperand, Operand};
    pub use crate::builder::QueryBuilder;
    pub use crate::chunk::ChunkFlow;
    pub use crate::executor::{ConnectionPool, Executor};
    pub use crate::row::{Cell, Row};
    pub use crate::transaction::TransactionScope;
    pub use crate::{raw, Brook, BrookError, Direction, LikeSide, MySqlValue, Query, Raw, Result};

    #[cfg(feature = "mysql-async")]
    pub use crate::driver::Config;
}
