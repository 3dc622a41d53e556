use thiserror::Error;

/// Errors surfaced by the builder and its executors.
///
/// Validation variants carry the clause label they were raised in, so a
/// failure reads as "WHERE: invalid identifier `name`".
#[derive(Debug, Clone, Error)]
pub enum BrookError {
    /// Structural name (table, column, alias) containing characters outside
    /// the allowed identifier class
    #[error("{context}: invalid identifier `{ident}`")]
    InvalidIdentifier {
        context: &'static str,
        ident: String,
    },

    /// Operator outside the allowed set for its position
    #[error("{context}: unsupported operator `{op}`")]
    UnsupportedOperator { context: &'static str, op: String },

    /// Sort direction other than ASC/DESC
    #[error("{context}: unsupported sort direction `{direction}`")]
    UnsupportedDirection {
        context: &'static str,
        direction: String,
    },

    /// Any other pre-emission argument failure (negative limit, payload
    /// shape, key arity mismatch, missing table, ...)
    #[error("{context}: {message}")]
    Validation {
        context: &'static str,
        message: String,
    },

    /// Builder-internal invariant broken during SQL emission
    #[error("emitter invariant violated: {0}")]
    Emission(String),

    /// Error propagated from the executor
    #[error("execution error: {0}")]
    Execution(String),

    /// Error in transaction lifecycle (begin, commit, rollback)
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl BrookError {
    /// Shorthand for an ad-hoc validation failure.
    pub fn validation(context: &'static str, message: impl Into<String>) -> Self {
        BrookError::Validation {
            context,
            message: message.into(),
        }
    }
}

/// Result type for builder operations
pub type Result<T> = std::result::Result<T, BrookError>;
