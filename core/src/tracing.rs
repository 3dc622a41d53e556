//! Tracing utilities for query and transaction observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]`
//! boilerplate at every call site.

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// brook_trace_query!(&query.sql, query.params.len());
/// ```
#[macro_export]
macro_rules! brook_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql = %$sql, params = $param_count, "brook.query");
    };
}

/// Emit an info-level tracing event for transaction lifecycle (begin,
/// commit, rollback).
///
/// ```ignore
/// brook_trace_tx!("begin");
/// ```
#[macro_export]
macro_rules! brook_trace_tx {
    ($event:literal) => {
        #[cfg(feature = "tracing")]
        tracing::info!(event = $event, "brook.transaction");
    };
}
