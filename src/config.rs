//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tunables for how statements map onto the backend.
///
/// # Example
///
/// ```rust
/// use kvsql::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert!(config.strict_drop);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stored in a record field to mark an explicit SQL NULL. Must not be a
    /// value any caller would store.
    pub null_sentinel: String,

    /// When set, `DROP TABLE` without `IF EXISTS` fails on a missing table.
    /// Otherwise it is a no-op like `DROP TABLE IF EXISTS`.
    pub strict_drop: bool,

    /// Write the declared column list to `schema:{table}` on CREATE TABLE.
    pub record_schema_text: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            null_sentinel: "\u{0}NULL\u{0}".to_string(),
            strict_drop: true,
            record_schema_text: true,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.null_sentinel.is_empty() {
            return Err(Error::validation("null_sentinel must not be empty"));
        }
        Ok(())
    }
}
