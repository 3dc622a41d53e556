//! SQL fragment building with flat chunk storage.

mod chunk;
mod tokens;

pub use chunk::SqlChunk;
pub use tokens::Token;

use std::borrow::Cow;

use smallvec::SmallVec;

use crate::value::MySqlValue;

/// A string fragment interpolated into SQL verbatim instead of being bound
/// as a parameter.
///
/// This is the only way to bypass parameterization. Use it for column
/// references and trusted formulas such as `col = col + 1`. Never construct
/// one from externally supplied data; nothing downstream re-validates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raw(String);

impl Raw {
    /// Wraps a trusted SQL fragment.
    pub fn new(fragment: impl Into<String>) -> Self {
        Raw(fragment.into())
    }

    /// The wrapped fragment.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the marker, returning the fragment.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for Raw {
    fn from(value: &str) -> Self {
        Raw(value.to_owned())
    }
}

/// Wraps a trusted SQL fragment in a [`Raw`] marker.
#[inline]
pub fn raw(fragment: impl Into<String>) -> Raw {
    Raw::new(fragment)
}

/// Compiled SQL text plus its bound parameters, in textual `?` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<MySqlValue>,
}

/// SQL fragment builder with flat chunk storage.
///
/// Uses `SmallVec<[SqlChunk; 8]>` so typical fragments stay off the heap.
/// Parameters travel inside their chunks, which keeps the parameter list in
/// textual order for free, including across spliced subqueries.
#[derive(Debug, Clone, Default)]
pub struct Sql {
    pub chunks: SmallVec<[SqlChunk; 8]>,
}

impl Sql {
    // ==================== constructors ====================

    /// Creates an empty fragment.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            chunks: SmallVec::new_const(),
        }
    }

    /// Creates a fragment holding a single token.
    #[inline]
    pub fn token(token: Token) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Token(token)],
        }
    }

    /// Creates a fragment holding a validated identifier.
    #[inline]
    pub fn ident(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Ident(name.into())],
        }
    }

    /// Creates a fragment holding raw text.
    #[inline]
    pub fn raw(text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Raw(text.into())],
        }
    }

    /// Creates a fragment holding a single bound parameter.
    #[inline]
    pub fn param(value: impl Into<MySqlValue>) -> Self {
        Self {
            chunks: smallvec::smallvec![SqlChunk::Param(value.into())],
        }
    }

    // ==================== builder methods ====================

    /// Appends another fragment (flat extend).
    #[inline]
    pub fn append(mut self, other: impl Into<Sql>) -> Self {
        let mut other = other.into();
        if !other.chunks.is_empty() {
            self.chunks.reserve(other.chunks.len());
            self.chunks.extend(other.chunks.drain(..));
        }
        self
    }

    /// Pushes a single chunk.
    #[inline]
    pub fn push(mut self, chunk: impl Into<SqlChunk>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    /// Wraps the fragment in parentheses.
    #[inline]
    pub fn parens(self) -> Self {
        Sql::token(Token::LPAREN).append(self).push(Token::RPAREN)
    }

    /// Joins fragments with a separator token.
    pub fn join<I>(sqls: I, separator: Token) -> Sql
    where
        I: IntoIterator<Item = Sql>,
    {
        let mut iter = sqls.into_iter();
        let Some(first) = iter.next() else {
            return Sql::empty();
        };
        let mut result = first;
        for item in iter {
            result = result.push(separator).append(item);
        }
        result
    }

    /// True when no chunks have been pushed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    // ==================== output methods ====================

    /// Number of bound parameters in the fragment.
    pub fn param_count(&self) -> usize {
        self.chunks
            .iter()
            .filter(|chunk| matches!(chunk, SqlChunk::Param(_)))
            .count()
    }

    /// Renders the fragment into SQL text plus its parameter list.
    pub fn to_query(&self) -> Query {
        let mut sql = String::with_capacity(self.estimate_capacity());
        let mut params = Vec::with_capacity(self.param_count());
        for (i, chunk) in self.chunks.iter().enumerate() {
            if i > 0 && needs_space(&self.chunks[i - 1], chunk) {
                sql.push(' ');
            }
            chunk.write(&mut sql);
            if let SqlChunk::Param(value) = chunk {
                params.push(value.clone());
            }
        }
        Query { sql, params }
    }

    fn estimate_capacity(&self) -> usize {
        self.chunks
            .iter()
            .map(SqlChunk::rendered_len)
            .sum::<usize>()
            + self.chunks.len()
    }
}

/// Spacing rule: chunks are space-separated except right after an opening
/// paren and right before a closing paren or comma.
fn needs_space(prev: &SqlChunk, next: &SqlChunk) -> bool {
    if matches!(prev, SqlChunk::Token(Token::LPAREN)) {
        return false;
    }
    !matches!(next, SqlChunk::Token(Token::RPAREN | Token::COMMA))
}

impl From<SqlChunk> for Sql {
    fn from(chunk: SqlChunk) -> Self {
        Sql {
            chunks: smallvec::smallvec![chunk],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_spacing() {
        let sql = Sql::token(Token::SELECT)
            .push(SqlChunk::ident("id"))
            .push(Token::COMMA)
            .push(SqlChunk::ident("name"))
            .push(Token::FROM)
            .push(SqlChunk::ident("users"));
        assert_eq!(sql.to_query().sql, "SELECT id, name FROM users");
    }

    #[test]
    fn params_follow_textual_order() {
        let inner = Sql::ident("a").push(Token::EQ).push(SqlChunk::param(1));
        let sql = Sql::ident("b")
            .push(Token::EQ)
            .push(SqlChunk::param(2))
            .push(Token::AND)
            .append(inner.parens());
        let query = sql.to_query();
        assert_eq!(query.sql, "b = ? AND (a = ?)");
        assert_eq!(
            query.params,
            vec![MySqlValue::Int(2), MySqlValue::Int(1)]
        );
    }

    #[test]
    fn placeholder_count_matches_params() {
        let sql = Sql::ident("x")
            .push(Token::IN)
            .append(
                Sql::join([Sql::param(1), Sql::param(2), Sql::param(3)], Token::COMMA).parens(),
            );
        let query = sql.to_query();
        assert_eq!(query.sql.matches('?').count(), query.params.len());
        assert_eq!(query.sql, "x IN (?, ?, ?)");
    }

    #[test]
    fn parens_hug_their_content() {
        let sub = Sql::token(Token::SELECT)
            .push(SqlChunk::raw("1"))
            .push(Token::FROM)
            .push(SqlChunk::ident("t"));
        let sql = Sql::token(Token::EXISTS).append(sub.parens());
        assert_eq!(sql.to_query().sql, "EXISTS (SELECT 1 FROM t)");
    }
}
