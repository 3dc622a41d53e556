//! Validation of structural SQL inputs.
//!
//! Everything that lands in SQL text as a name, operator, or direction must
//! pass through here first; bound parameter values never do.

use crate::error::{BrookError, Result};

/// Operator vocabularies for the different comparison positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorSet {
    /// Column-vs-value comparisons: `=, !=, <>, >, <, >=, <=, LIKE,
    /// NOT LIKE, IS, IS NOT`
    Comparison,
    /// Column-vs-column and scalar-subquery comparisons: `=, !=, <>, >, <,
    /// >=, <=`
    Column,
}

const SYMBOL_OPERATORS: &[&str] = &["=", "!=", "<>", ">", "<", ">=", "<="];
const WORD_OPERATORS: &[&str] = &["LIKE", "NOT LIKE", "IS", "IS NOT"];

/// Sort direction for ORDER BY entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Pattern wrapping for LIKE searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeSide {
    /// `%value%`
    #[default]
    Both,
    /// `%value`
    Before,
    /// `value%`
    After,
}

/// Checks that `ident` is non-empty and contains only `[A-Za-z0-9_.` and
/// backtick characters. The dot admits `schema.table` and `table.column`
/// notation; the backtick admits pre-quoted names.
pub fn validate_ident(ident: &str, context: &'static str) -> Result<()> {
    if !ident.is_empty() && ident.bytes().all(is_ident_byte) {
        return Ok(());
    }
    Err(BrookError::InvalidIdentifier {
        context,
        ident: ident.to_owned(),
    })
}

#[inline]
const fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'.' | b'`')
}

/// Checks `op` against the given vocabulary and returns it normalized
/// (word operators uppercased).
pub fn validate_operator(op: &str, set: OperatorSet, context: &'static str) -> Result<String> {
    if SYMBOL_OPERATORS.contains(&op) {
        return Ok(op.to_owned());
    }
    if set == OperatorSet::Comparison {
        let upper = op.to_ascii_uppercase();
        if WORD_OPERATORS.contains(&upper.as_str()) {
            return Ok(upper);
        }
    }
    Err(BrookError::UnsupportedOperator {
        context,
        op: op.to_owned(),
    })
}

/// Parses a sort direction, case-insensitively.
pub fn validate_direction(direction: &str, context: &'static str) -> Result<Direction> {
    match direction.to_ascii_uppercase().as_str() {
        "ASC" => Ok(Direction::Asc),
        "DESC" => Ok(Direction::Desc),
        _ => Err(BrookError::UnsupportedDirection {
            context,
            direction: direction.to_owned(),
        }),
    }
}

/// Checks that a LIMIT/OFFSET bound is non-negative.
pub fn validate_page_bound(value: i64, context: &'static str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| BrookError::validation(context, format!("negative bound {value}")))
}

/// Escapes LIKE metacharacters (`\`, `%`, `_`) in a search value with `\`.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Escapes and wraps a search value into a LIKE pattern.
pub fn like_pattern(value: &str, side: LikeSide) -> String {
    let escaped = escape_like(value);
    match side {
        LikeSide::Both => format!("%{escaped}%"),
        LikeSide::Before => format!("%{escaped}"),
        LikeSide::After => format!("{escaped}%"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_qualified_names() {
        for ident in ["users", "users.id", "db.users", "_tmp", "a1", "`quoted`"] {
            assert!(validate_ident(ident, "TEST").is_ok(), "{ident}");
        }
    }

    #[test]
    fn rejects_structurally_unsafe_names() {
        for ident in ["", "users; --", "na me", "x'", "a(b)", "col\"", "x;"] {
            assert!(validate_ident(ident, "TEST").is_err(), "{ident:?}");
        }
    }

    #[test]
    fn operator_sets() {
        assert_eq!(
            validate_operator("like", OperatorSet::Comparison, "TEST").unwrap(),
            "LIKE"
        );
        assert_eq!(
            validate_operator("is not", OperatorSet::Comparison, "TEST").unwrap(),
            "IS NOT"
        );
        assert!(validate_operator("LIKE", OperatorSet::Column, "TEST").is_err());
        assert!(validate_operator("=;DROP", OperatorSet::Comparison, "TEST").is_err());
    }

    #[test]
    fn like_escaping() {
        assert_eq!(escape_like(r"50%_\x"), r"50\%\_\\x");
        assert_eq!(like_pattern("jo", LikeSide::After), "jo%");
        assert_eq!(like_pattern("jo", LikeSide::Before), "%jo");
        assert_eq!(like_pattern("jo", LikeSide::Both), "%jo%");
    }

    #[test]
    fn page_bounds() {
        assert_eq!(validate_page_bound(0, "LIMIT").unwrap(), 0);
        assert!(validate_page_bound(-1, "LIMIT").is_err());
    }
}
