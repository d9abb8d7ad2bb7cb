use std::fmt;
use std::sync::Arc;

use crate::data_type::DataType;

/// A column value as seen by the caller of a query.
///
/// Records are stored as text; a `Value` is what that text becomes once it is
/// read back through the column's declared [DataType]. SQL `NULL` is
/// [Value::Null] here and never a magic string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL, or a column the record does not carry.
    Null,
    /// A 64-bit signed integer value.
    Int(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A UTF-8 string value, wrapped in an [Arc] for cheap cloning.
    Text(Arc<str>),
    /// A boolean value.
    Bool(bool),
}

impl Value {
    /// Reads a stored string back as the declared type.
    ///
    /// `None` is SQL NULL. Text that does not parse as the declared type is
    /// returned as [Value::Text] unchanged, since nothing checked it on the
    /// way in. Without a declared type the text is kept as is.
    pub fn decode(raw: Option<&str>, data_type: Option<DataType>) -> Self {
        let Some(raw) = raw else {
            return Self::Null;
        };

        let decoded = match data_type {
            Some(ty) if ty.is_integer() => raw.trim().parse::<i64>().ok().map(Self::Int),
            Some(DataType::Double) => raw.trim().parse::<f64>().ok().map(Self::Float),
            Some(DataType::Boolean) => parse_bool(raw).map(Self::Bool),
            _ => None,
        };

        decoded.unwrap_or_else(|| Self::Text(raw.into()))
    }

    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the inner integer value if this is a [Value::Int].
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float; integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the inner string slice if this is a [Value::Text].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner boolean value if this is a [Value::Bool].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Textual form of the value; NULL renders as `NULL`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}
