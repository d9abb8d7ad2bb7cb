//! Forward-only access to the rows of a query result.

use crate::error::{Error, Result};
use crate::value::Value;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    OnRow(usize),
    Exhausted,
}

/// A single-pass cursor over rows fetched eagerly by a query.
///
/// The cursor starts before the first row; [RowCursor::advance] moves it one
/// row forward and never back. It holds no backend resources, so dropping or
/// closing it only frees the buffered rows.
///
/// # Example
/// ```
/// use kvsql::{RowCursor, Value};
///
/// let mut cursor = RowCursor::new(
///     vec!["id".into(), "name".into()],
///     vec![vec![Value::Int(1), Value::Text("Ann".into())]],
/// );
/// assert!(cursor.get(0).is_err());
///
/// assert!(cursor.advance());
/// assert_eq!(cursor.get_i64("id").unwrap(), Some(1));
/// assert_eq!(cursor.get_string("name").unwrap().as_deref(), Some("Ann"));
///
/// assert!(!cursor.advance());
/// ```
#[derive(Debug, Clone)]
pub struct RowCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    position: Position,
}

impl RowCursor {
    /// Builds a cursor over `rows`. A row shorter than `columns` is padded
    /// with NULL; values past the last column are dropped.
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<Value>>) -> Self {
        for row in &mut rows {
            row.resize(columns.len(), Value::Null);
        }
        Self {
            columns,
            rows,
            position: Position::BeforeFirst,
        }
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows the query produced, consumed or not.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Moves to the next row. Returns `false` once the rows run out; the
    /// cursor is then exhausted for good.
    pub fn advance(&mut self) -> bool {
        let next = match self.position {
            Position::BeforeFirst => 0,
            Position::OnRow(i) => i + 1,
            Position::Exhausted => return false,
        };

        if next < self.rows.len() {
            self.position = Position::OnRow(next);
            true
        } else {
            self.position = Position::Exhausted;
            false
        }
    }

    pub fn is_before_first(&self) -> bool {
        self.position == Position::BeforeFirst
    }

    pub fn is_exhausted(&self) -> bool {
        self.position == Position::Exhausted
    }

    /// Index of the current row.
    pub fn row_index(&self) -> Option<usize> {
        match self.position {
            Position::OnRow(i) => Some(i),
            _ => None,
        }
    }

    fn current_row(&self) -> Result<&[Value]> {
        match self.position {
            Position::OnRow(i) => Ok(&self.rows[i]),
            Position::BeforeFirst => Err(Error::cursor_state("cursor is before the first row")),
            Position::Exhausted => Err(Error::cursor_state("cursor is past the last row")),
        }
    }

    /// Value of the 0-based column `index` in the current row.
    pub fn get(&self, index: usize) -> Result<&Value> {
        let row = self.current_row()?;
        row.get(index).ok_or_else(|| {
            Error::validation(format!(
                "column index {index} out of range for {} columns",
                self.columns.len()
            ))
        })
    }

    /// Value of the named column in the current row. A name the result does
    /// not carry reads as NULL.
    pub fn get_by_name(&self, name: &str) -> Result<&Value> {
        let row = self.current_row()?;
        let index = self
            .columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)));

        Ok(index.and_then(|i| row.get(i)).unwrap_or(&NULL))
    }

    /// Textual form of the named column, `None` for NULL.
    pub fn get_string(&self, name: &str) -> Result<Option<String>> {
        let value = self.get_by_name(name)?;
        Ok((!value.is_null()).then(|| value.to_string()))
    }

    pub fn get_i64(&self, name: &str) -> Result<Option<i64>> {
        self.typed(name, "integer", Value::as_int)
    }

    pub fn get_f64(&self, name: &str) -> Result<Option<f64>> {
        self.typed(name, "float", Value::as_float)
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        self.typed(name, "boolean", Value::as_bool)
    }

    fn typed<T>(&self, name: &str, expected: &str, read: fn(&Value) -> Option<T>) -> Result<Option<T>> {
        let value = self.get_by_name(name)?;
        if value.is_null() {
            return Ok(None);
        }
        read(value).map(Some).ok_or_else(|| {
            Error::validation(format!("column {name:?} holds {value:?}, not a {expected}"))
        })
    }

    /// Releases the buffered rows and exhausts the cursor.
    pub fn close(&mut self) {
        self.rows = Vec::new();
        self.position = Position::Exhausted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn cursor() -> RowCursor {
        RowCursor::new(
            vec!["id".into(), "name".into(), "score".into()],
            vec![
                vec![Value::Int(1), Value::Text("Ann".into()), Value::Float(1.5)],
                vec![Value::Int(2), Value::Null, Value::Text("n/a".into())],
            ],
        )
    }

    #[test]
    fn test_state_transitions() {
        let mut cursor = cursor();
        assert!(cursor.is_before_first());
        assert_eq!(cursor.row_index(), None);

        assert!(cursor.advance());
        assert_eq!(cursor.row_index(), Some(0));
        assert!(cursor.advance());
        assert_eq!(cursor.row_index(), Some(1));

        assert!(!cursor.advance());
        assert!(cursor.is_exhausted());
        // Terminal: advancing again changes nothing.
        assert!(!cursor.advance());
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_access_outside_rows_fails() {
        let mut cursor = cursor();
        assert_eq!(cursor.get(0).unwrap_err().kind(), ErrorKind::CursorState);
        assert_eq!(
            cursor.get_by_name("id").unwrap_err().kind(),
            ErrorKind::CursorState
        );

        while cursor.advance() {}
        assert_eq!(cursor.get(0).unwrap_err().kind(), ErrorKind::CursorState);
    }

    #[test]
    fn test_access_by_ordinal_and_name() {
        let mut cursor = cursor();
        cursor.advance();

        assert_eq!(cursor.get(1).unwrap(), &Value::Text("Ann".into()));
        assert_eq!(cursor.get_by_name("name").unwrap(), &Value::Text("Ann".into()));
        assert_eq!(cursor.get_by_name("NAME").unwrap(), &Value::Text("Ann".into()));
        assert_eq!(cursor.get_by_name("missing").unwrap(), &Value::Null);
        assert_eq!(cursor.get(3).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_typed_access() {
        let mut cursor = cursor();
        cursor.advance();
        assert_eq!(cursor.get_i64("id").unwrap(), Some(1));
        assert_eq!(cursor.get_f64("score").unwrap(), Some(1.5));
        assert_eq!(cursor.get_string("id").unwrap().as_deref(), Some("1"));

        cursor.advance();
        assert_eq!(cursor.get_string("name").unwrap(), None);
        assert_eq!(cursor.get_i64("name").unwrap(), None);
        assert!(cursor.get_f64("score").is_err());
        assert!(cursor.get_bool("id").is_err());
    }

    #[test]
    fn test_rows_are_fitted_to_columns() {
        let mut cursor = RowCursor::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Int(1)], vec![Value::Int(2), Value::Int(3), Value::Int(4)]],
        );

        assert!(cursor.advance());
        assert_eq!(cursor.get_by_name("b").unwrap(), &Value::Null);
        assert_eq!(cursor.get(1).unwrap(), &Value::Null);

        assert!(cursor.advance());
        assert_eq!(cursor.get_i64("b").unwrap(), Some(3));
        assert_eq!(cursor.get(2).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_close() {
        let mut cursor = cursor();
        cursor.advance();
        cursor.close();

        assert!(cursor.is_exhausted());
        assert!(!cursor.advance());
        assert!(cursor.get(0).is_err());
    }
}
