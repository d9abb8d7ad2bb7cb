//! Conversion between in-memory records and backend field maps.
//!
//! In memory an explicit NULL is `None`. The sentinel string only exists in
//! the field map written to the backend.

use std::collections::{BTreeMap, HashMap};

/// One record: column name -> stored text, `None` for SQL NULL.
pub type Record = BTreeMap<String, Option<String>>;

/// Turns a record into the field map written to the backend.
pub fn encode(record: &Record, null_sentinel: &str) -> HashMap<String, String> {
    record
        .iter()
        .map(|(column, value)| {
            let stored = value.as_deref().unwrap_or(null_sentinel);
            (column.clone(), stored.to_string())
        })
        .collect()
}

/// Reads a backend field map back into a record.
pub fn decode(fields: HashMap<String, String>, null_sentinel: &str) -> Record {
    fields
        .into_iter()
        .map(|(column, value)| {
            let value = (value != null_sentinel).then_some(value);
            (column, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: &str = "\u{0}NULL\u{0}";

    #[test]
    fn test_null_only_at_the_wire() {
        let mut record = Record::new();
        record.insert("name".into(), Some("Ann".into()));
        record.insert("nick".into(), None);

        let fields = encode(&record, SENTINEL);
        assert_eq!(fields["name"], "Ann");
        assert_eq!(fields["nick"], SENTINEL);

        assert_eq!(decode(fields, SENTINEL), record);
    }

    #[test]
    fn test_literal_null_text_is_not_null() {
        let fields = HashMap::from([("nick".to_string(), "NULL".to_string())]);
        let record = decode(fields, SENTINEL);
        assert_eq!(record["nick"], Some("NULL".to_string()));
    }
}
