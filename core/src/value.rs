//! MySQL scalar values and conversions.

use std::borrow::Cow;
use std::hash::{Hash, Hasher};

/// A MySQL scalar value.
///
/// This is the parameter type bound to `?` placeholders and the cell type of
/// result rows. `Double` compares and hashes by bit pattern so values can key
/// hydration maps.
#[derive(Debug, Clone, Default)]
pub enum MySqlValue {
    /// NULL value
    #[default]
    Null,
    /// Signed integer value (i64)
    Int(i64),
    /// Unsigned integer value (u64)
    UInt(u64),
    /// Floating point value (f64)
    Double(f64),
    /// Text value
    Text(String),
    /// Binary value
    Bytes(Vec<u8>),
}

impl MySqlValue {
    /// Returns true if this value is NULL.
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, MySqlValue::Null)
    }

    /// Returns the signed integer value if this is an `Int`, or a `UInt`
    /// that fits.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MySqlValue::Int(value) => Some(*value),
            MySqlValue::UInt(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Returns the unsigned integer value if this is a non-negative integer.
    #[inline]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MySqlValue::UInt(value) => Some(*value),
            MySqlValue::Int(value) => u64::try_from(*value).ok(),
            _ => None,
        }
    }

    /// Returns the floating point value if this is a `Double`.
    #[inline]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            MySqlValue::Double(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the text value if this is `Text`.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MySqlValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the binary value if this is `Bytes`.
    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MySqlValue::Bytes(value) => Some(value.as_slice()),
            _ => None,
        }
    }

    /// Coerces this value to a numeric value.
    ///
    /// Integers and doubles pass through; text and UTF-8 bytes are parsed,
    /// preferring an integer reading over a float one. Returns `None` for
    /// NULL and unparseable input. Used to normalize aggregate columns,
    /// which MySQL commonly returns as decimal strings.
    pub fn to_number(&self) -> Option<MySqlValue> {
        match self {
            MySqlValue::Int(_) | MySqlValue::UInt(_) | MySqlValue::Double(_) => Some(self.clone()),
            MySqlValue::Text(text) => parse_number(text),
            MySqlValue::Bytes(bytes) => std::str::from_utf8(bytes).ok().and_then(parse_number),
            MySqlValue::Null => None,
        }
    }
}

fn parse_number(text: &str) -> Option<MySqlValue> {
    let text = text.trim();
    if let Ok(int) = text.parse::<i64>() {
        return Some(MySqlValue::Int(int));
    }
    text.parse::<f64>().ok().map(MySqlValue::Double)
}

impl PartialEq for MySqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MySqlValue::Null, MySqlValue::Null) => true,
            (MySqlValue::Int(a), MySqlValue::Int(b)) => a == b,
            (MySqlValue::UInt(a), MySqlValue::UInt(b)) => a == b,
            (MySqlValue::Double(a), MySqlValue::Double(b)) => a.to_bits() == b.to_bits(),
            (MySqlValue::Text(a), MySqlValue::Text(b)) => a == b,
            (MySqlValue::Bytes(a), MySqlValue::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for MySqlValue {}

impl Hash for MySqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            MySqlValue::Null => {}
            MySqlValue::Int(value) => value.hash(state),
            MySqlValue::UInt(value) => value.hash(state),
            MySqlValue::Double(value) => value.to_bits().hash(state),
            MySqlValue::Text(value) => value.hash(state),
            MySqlValue::Bytes(value) => value.hash(state),
        }
    }
}

impl core::fmt::Display for MySqlValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MySqlValue::Null => write!(f, "NULL"),
            MySqlValue::Int(value) => write!(f, "{value}"),
            MySqlValue::UInt(value) => write!(f, "{value}"),
            MySqlValue::Double(value) => write!(f, "{value}"),
            MySqlValue::Text(value) => write!(f, "{value}"),
            MySqlValue::Bytes(value) => write!(f, "{}", String::from_utf8_lossy(value)),
        }
    }
}

// ==================== From implementations ====================

macro_rules! impl_from_signed {
    ($($ty:ty),*) => {
        $(impl From<$ty> for MySqlValue {
            #[inline]
            fn from(value: $ty) -> Self {
                MySqlValue::Int(value as i64)
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($ty:ty),*) => {
        $(impl From<$ty> for MySqlValue {
            #[inline]
            fn from(value: $ty) -> Self {
                MySqlValue::UInt(value as u64)
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64, isize);
impl_from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for MySqlValue {
    #[inline]
    fn from(value: f32) -> Self {
        MySqlValue::Double(value as f64)
    }
}

impl From<f64> for MySqlValue {
    #[inline]
    fn from(value: f64) -> Self {
        MySqlValue::Double(value)
    }
}

impl From<bool> for MySqlValue {
    #[inline]
    fn from(value: bool) -> Self {
        MySqlValue::Int(value as i64)
    }
}

impl From<&str> for MySqlValue {
    #[inline]
    fn from(value: &str) -> Self {
        MySqlValue::Text(value.to_owned())
    }
}

impl From<String> for MySqlValue {
    #[inline]
    fn from(value: String) -> Self {
        MySqlValue::Text(value)
    }
}

impl From<Cow<'_, str>> for MySqlValue {
    #[inline]
    fn from(value: Cow<'_, str>) -> Self {
        MySqlValue::Text(value.into_owned())
    }
}

impl From<&[u8]> for MySqlValue {
    #[inline]
    fn from(value: &[u8]) -> Self {
        MySqlValue::Bytes(value.to_owned())
    }
}

impl From<Vec<u8>> for MySqlValue {
    #[inline]
    fn from(value: Vec<u8>) -> Self {
        MySqlValue::Bytes(value)
    }
}

impl<T> From<Option<T>> for MySqlValue
where
    T: Into<MySqlValue>,
{
    #[inline]
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => MySqlValue::Null,
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for MySqlValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MySqlValue::Null => serializer.serialize_none(),
            MySqlValue::Int(value) => serializer.serialize_i64(*value),
            MySqlValue::UInt(value) => serializer.serialize_u64(*value),
            MySqlValue::Double(value) => serializer.serialize_f64(*value),
            MySqlValue::Text(value) => serializer.serialize_str(value),
            MySqlValue::Bytes(value) => serializer.serialize_bytes(value),
        }
    }
}
