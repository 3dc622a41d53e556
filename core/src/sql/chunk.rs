use std::borrow::Cow;

use crate::sql::tokens::Token;
use crate::value::MySqlValue;

/// A chunk is one atom of an SQL statement.
///
/// - `Token` - fixed keywords and punctuation
/// - `Ident` - a structural name that passed identifier validation
/// - `Raw` - trusted raw text (validated operators, numeric literals,
///   caller-supplied raw markers)
/// - `Param` - a bound value rendered as `?`
///
/// Identifiers render unquoted; backticks appear only when the caller put
/// them in the name itself.
#[derive(Debug, Clone)]
pub enum SqlChunk {
    /// SQL keyword or punctuation
    Token(Token),
    /// Validated identifier, rendered as-is
    Ident(Cow<'static, str>),
    /// Raw SQL text, rendered as-is
    Raw(Cow<'static, str>),
    /// Bound parameter, rendered as `?`
    Param(MySqlValue),
}

impl SqlChunk {
    /// Creates an identifier chunk.
    #[inline]
    pub fn ident(name: impl Into<Cow<'static, str>>) -> Self {
        SqlChunk::Ident(name.into())
    }

    /// Creates a raw text chunk.
    #[inline]
    pub fn raw(text: impl Into<Cow<'static, str>>) -> Self {
        SqlChunk::Raw(text.into())
    }

    /// Creates a parameter chunk.
    #[inline]
    pub fn param(value: impl Into<MySqlValue>) -> Self {
        SqlChunk::Param(value.into())
    }

    /// Write chunk content to the buffer. Parameters render as the MySQL
    /// positional placeholder.
    pub(crate) fn write(&self, buf: &mut String) {
        match self {
            SqlChunk::Token(token) => buf.push_str(token.as_str()),
            SqlChunk::Ident(name) => buf.push_str(name),
            SqlChunk::Raw(text) => buf.push_str(text),
            SqlChunk::Param(_) => buf.push('?'),
        }
    }

    pub(crate) fn rendered_len(&self) -> usize {
        match self {
            SqlChunk::Token(token) => token.as_str().len(),
            SqlChunk::Ident(name) => name.len(),
            SqlChunk::Raw(text) => text.len(),
            SqlChunk::Param(_) => 1,
        }
    }
}

impl From<Token> for SqlChunk {
    #[inline]
    fn from(value: Token) -> Self {
        SqlChunk::Token(value)
    }
}

impl From<MySqlValue> for SqlChunk {
    #[inline]
    fn from(value: MySqlValue) -> Self {
        SqlChunk::Param(value)
    }
}
