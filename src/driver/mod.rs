//! Concrete database drivers behind feature flags.

#[cfg(feature = "mysql-async")]
mod mysql;

#[cfg(feature = "mysql-async")]
pub use mysql::{Config, MySqlPool};
