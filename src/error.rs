//! Error types shared by every stage of statement handling.

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [Error], stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The text matched no recognized statement shape.
    Parse,
    /// The referenced table is missing, or exists when it must not.
    Schema,
    /// Arity mismatch, unbound parameter, unknown column or unsupported literal.
    Validation,
    /// Column access on a cursor that is not positioned on a row.
    CursorState,
    /// Failure reported by the key-value backend.
    Execution,
}

/// Every failure a statement can produce.
///
/// Nothing is retried internally: each variant reaches the caller as soon as
/// it is raised.
#[derive(Debug, Error)]
pub enum Error {
    /// Statement text could not be tokenized or parsed.
    #[error("parse error: {message}")]
    Parse {
        /// What the parser expected or rejected.
        message: String,
    },

    /// The referenced table does not exist.
    #[error("table {table:?} does not exist")]
    TableNotFound {
        /// Table name.
        table: String,
    },

    /// CREATE TABLE without IF NOT EXISTS on an existing table.
    #[error("table {table:?} already exists")]
    TableExists {
        /// Table name.
        table: String,
    },

    /// The statement is well formed but cannot be applied as written.
    #[error("validation error: {message}")]
    Validation {
        /// Error message.
        message: String,
    },

    /// A `?` placeholder had no bound value at execution time.
    #[error("parameter {index} is not set")]
    UnboundParameter {
        /// 1-based placeholder position.
        index: usize,
    },

    /// Column access outside of a positioned row.
    #[error("cursor error: {message}")]
    CursorState {
        /// Error message.
        message: String,
    },

    /// Backend failure, surfaced as-is.
    #[error(transparent)]
    Execution(#[from] BackendError),
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn table_not_found(table: &str) -> Self {
        Self::TableNotFound {
            table: table.to_string(),
        }
    }

    pub(crate) fn cursor_state(message: impl Into<String>) -> Self {
        Self::CursorState {
            message: message.into(),
        }
    }

    /// Returns the category this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Parse,
            Self::TableNotFound { .. } | Self::TableExists { .. } => ErrorKind::Schema,
            Self::Validation { .. } | Self::UnboundParameter { .. } => ErrorKind::Validation,
            Self::CursorState { .. } => ErrorKind::CursorState,
            Self::Execution(_) => ErrorKind::Execution,
        }
    }
}
