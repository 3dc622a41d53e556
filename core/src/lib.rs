//! Brook Core - SQL representation layer
//!
//! The pieces the builder crate compiles into: the chunked [`Sql`] fragment
//! type, the MySQL scalar [`MySqlValue`], identifier and operator
//! validation, and the shared error type.
//!
//! Fragments carry their bound parameters inside [`sql::SqlChunk::Param`]
//! chunks, so splicing subqueries keeps the parameter list in textual
//! placeholder order without any bookkeeping.

pub mod error;
pub mod ident;
pub mod sql;
pub mod tracing;
pub mod value;

pub use error::{BrookError, Result};
pub use ident::{Direction, LikeSide, OperatorSet};
pub use sql::{raw, Query, Raw, Sql, SqlChunk, Token};
pub use value::MySqlValue;
