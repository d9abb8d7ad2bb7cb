use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Represents the column types a table may declare.
///
/// Values of every type travel to the backend as strings; the declared type
/// only decides how they are read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// A 32-bit integer as declared; read back as a 64-bit integer.
    Integer,
    /// A 64-bit signed integer.
    BigInt,
    /// A character string with an optional declared length.
    Varchar(Option<u32>),
    /// An unbounded character string.
    Text,
    /// A timestamp, kept in its textual form.
    Timestamp,
    /// A boolean value (true or false).
    Boolean,
    /// A 64-bit floating-point number.
    Double,
}

impl DataType {
    /// Returns `true` for types read back as integers.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer | Self::BigInt)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("INTEGER"),
            Self::BigInt => f.write_str("BIGINT"),
            Self::Varchar(Some(len)) => write!(f, "VARCHAR({len})"),
            Self::Varchar(None) => f.write_str("VARCHAR"),
            Self::Text => f.write_str("TEXT"),
            Self::Timestamp => f.write_str("TIMESTAMP"),
            Self::Boolean => f.write_str("BOOLEAN"),
            Self::Double => f.write_str("DOUBLE"),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    /// Parses the persisted form written by [Display], e.g. `VARCHAR(255)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let upper = s.to_ascii_uppercase();

        if let Some(rest) = upper.strip_prefix("VARCHAR") {
            let rest = rest.trim();
            if rest.is_empty() {
                return Ok(Self::Varchar(None));
            }
            let len = rest
                .strip_prefix('(')
                .and_then(|r| r.strip_suffix(')'))
                .and_then(|r| r.trim().parse::<u32>().ok())
                .ok_or_else(|| Error::validation(format!("invalid column type {s:?}")))?;
            return Ok(Self::Varchar(Some(len)));
        }

        match upper.as_str() {
            "INTEGER" | "INT" => Ok(Self::Integer),
            "BIGINT" => Ok(Self::BigInt),
            "TEXT" => Ok(Self::Text),
            "TIMESTAMP" => Ok(Self::Timestamp),
            "BOOLEAN" | "BOOL" => Ok(Self::Boolean),
            "DOUBLE" => Ok(Self::Double),
            _ => Err(Error::validation(format!("invalid column type {s:?}"))),
        }
    }
}
