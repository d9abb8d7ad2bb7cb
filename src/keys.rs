//! Key-space layout shared with any other tool reading the backend.
//!
//! | key                | kind      | holds                              |
//! |--------------------|-----------|------------------------------------|
//! | `{table}:columns`  | field map | column name -> declared type       |
//! | `{table}:counter`  | scalar    | last auto-increment id             |
//! | `{table}:keys`     | set       | record keys of the table           |
//! | `{table}:{id}`     | field map | one record                         |
//! | `schema:{table}`   | scalar    | declared column list, diagnostics  |

/// Prefix of the `schema:{table}` keys. No table may use it as its name, or
/// its own keys would overlap the other tables' schema entries.
pub const SCHEMA_NAMESPACE: &str = "schema";

pub fn columns_key(table: &str) -> String {
    format!("{table}:columns")
}

pub fn counter_key(table: &str) -> String {
    format!("{table}:counter")
}

pub fn members_key(table: &str) -> String {
    format!("{table}:keys")
}

pub fn record_key(table: &str, id: &str) -> String {
    format!("{table}:{id}")
}

pub fn schema_key(table: &str) -> String {
    format!("{SCHEMA_NAMESPACE}:{table}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(columns_key("t"), "t:columns");
        assert_eq!(counter_key("t"), "t:counter");
        assert_eq!(members_key("t"), "t:keys");
        assert_eq!(record_key("t", "17"), "t:17");
        assert_eq!(schema_key("t"), "schema:t");
    }
}
