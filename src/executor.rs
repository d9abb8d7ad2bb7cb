use std::collections::HashSet;

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::ast::{
    Command, CreateTable, Delete, DropTable, Insert, Literal, Predicate, Projection, Select,
    Update,
};
use crate::backend::{BatchOp, KvBackend};
use crate::config::EngineConfig;
use crate::cursor::RowCursor;
use crate::error::{Error, Result};
use crate::keys;
use crate::record::{self, Record};
use crate::schema::{SchemaCatalog, TableSchema};
use crate::value::Value;

/// Name of the single column a `COUNT(*)` query returns.
pub const COUNT_COLUMN: &str = "count";

/// What executing a [Command] produced.
#[derive(Debug)]
pub enum Outcome {
    /// Statement without a result set. `last_insert_id` carries the
    /// auto-increment id an INSERT generated.
    RowsAffected {
        count: u64,
        last_insert_id: Option<i64>,
    },
    /// Rows of a SELECT.
    Rows(RowCursor),
}

impl Outcome {
    fn affected(count: u64) -> Self {
        Self::RowsAffected {
            count,
            last_insert_id: None,
        }
    }

    pub fn has_result_set(&self) -> bool {
        matches!(self, Self::Rows(_))
    }

    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            Self::RowsAffected { count, .. } => Some(*count),
            Self::Rows(_) => None,
        }
    }

    pub fn last_insert_id(&self) -> Option<i64> {
        match self {
            Self::RowsAffected { last_insert_id, .. } => *last_insert_id,
            Self::Rows(_) => None,
        }
    }

    pub fn into_cursor(self) -> Option<RowCursor> {
        match self {
            Self::Rows(cursor) => Some(cursor),
            Self::RowsAffected { .. } => None,
        }
    }
}

/// A predicate with its literal already resolved to stored form.
struct Filter<'c> {
    column: &'c str,
    value: Option<String>,
}

impl Filter<'_> {
    /// String equality on the stored text. A NULL (or absent) field only
    /// matches a NULL literal.
    fn matches(&self, record: &Record) -> bool {
        let stored = record.get(self.column).and_then(|v| v.as_deref());
        stored == self.value.as_deref()
    }
}

fn resolve_filter(predicate: Option<&Predicate>) -> Result<Option<Filter<'_>>> {
    let Some(predicate) = predicate else {
        return Ok(None);
    };
    Ok(Some(Filter {
        column: &predicate.column,
        value: predicate.value.to_stored()?,
    }))
}

fn require_filter_column(schema: &TableSchema, filter: Option<&Filter<'_>>) -> Result<()> {
    if let Some(filter) = filter {
        schema.require_column(filter.column)?;
    }
    Ok(())
}

/// Runs parsed commands against one backend handle.
///
/// Each call is synchronous. INSERT, CREATE TABLE, DROP TABLE and each
/// single-record DELETE go to the backend as one atomic batch. UPDATE and
/// DELETE walk the table record by record, so a backend failure part-way
/// leaves the records already processed changed and the rest untouched.
///
/// UPDATE writes only the assigned field of each matched record. The scan and
/// the write are separate calls, so a concurrent DELETE landing between them
/// leaves a one-field hash behind that is not in the table's membership set
/// and never shows up in scans.
pub struct Executor<'a, B: KvBackend + ?Sized> {
    backend: &'a B,
    schema: &'a dyn SchemaCatalog,
    config: &'a EngineConfig,
}

impl<'a, B: KvBackend + ?Sized> Executor<'a, B> {
    pub fn new(backend: &'a B, schema: &'a dyn SchemaCatalog, config: &'a EngineConfig) -> Self {
        Self {
            backend,
            schema,
            config,
        }
    }

    pub fn execute(&self, command: &Command) -> Result<Outcome> {
        match command {
            Command::CreateTable(create) => self.create_table(create),
            Command::DropTable(drop) => self.drop_table(drop),
            Command::Insert(insert) => self.insert(insert),
            Command::Select(select) => self.select(select).map(Outcome::Rows),
            Command::Update(update) => self.update(update),
            Command::Delete(delete) => self.delete(delete),
        }
    }

    /// Stored form of a literal written by INSERT or UPDATE. Text equal to
    /// the NULL sentinel is refused.
    fn stored_value(&self, literal: &Literal) -> Result<Option<String>> {
        let value = literal.to_stored()?;
        if value.as_deref() == Some(self.config.null_sentinel.as_str()) {
            return Err(Error::validation(
                "value collides with the configured NULL sentinel",
            ));
        }
        Ok(value)
    }

    fn require_table(&self, table: &str) -> Result<TableSchema> {
        self.schema
            .columns_of(table)?
            .ok_or_else(|| Error::table_not_found(table))
    }

    fn create_table(&self, create: &CreateTable) -> Result<Outcome> {
        self.schema
            .create_table(&create.name, &create.columns, create.if_not_exists)?;
        Ok(Outcome::affected(0))
    }

    fn drop_table(&self, drop: &DropTable) -> Result<Outcome> {
        match self.schema.drop_table(&drop.name)? {
            Some(_) => Ok(Outcome::affected(0)),
            None if drop.if_exists || !self.config.strict_drop => {
                debug!(table = %drop.name, "drop of missing table ignored");
                Ok(Outcome::affected(0))
            }
            None => Err(Error::table_not_found(&drop.name)),
        }
    }

    fn insert(&self, insert: &Insert) -> Result<Outcome> {
        if insert.columns.len() != insert.values.len() {
            return Err(Error::validation(format!(
                "column count {} does not match value count {}",
                insert.columns.len(),
                insert.values.len()
            )));
        }

        let mut seen = HashSet::new();
        let mut row = Record::new();
        for (column, literal) in insert.columns.iter().zip(&insert.values) {
            if !seen.insert(column.as_str()) {
                return Err(Error::validation(format!("column {column:?} listed twice")));
            }
            row.insert(column.clone(), self.stored_value(literal)?);
        }

        let schema = self.require_table(&insert.table)?;
        for column in &insert.columns {
            schema.require_column(column)?;
        }

        let (id, generated) = match schema.auto_increment_column() {
            Some(auto) => {
                if row.contains_key(&auto.name) {
                    return Err(Error::validation(format!(
                        "AUTO_INCREMENT column {:?} cannot be assigned",
                        auto.name
                    )));
                }
                let id = self.backend.incr(&keys::counter_key(&insert.table))?;
                row.insert(auto.name.clone(), Some(id.to_string()));
                (id.to_string(), Some(id))
            }
            None => (Uuid::new_v4().simple().to_string(), None),
        };

        let key = keys::record_key(&insert.table, &id);
        self.backend.atomic(vec![
            BatchOp::HSet {
                key: key.clone(),
                fields: record::encode(&row, &self.config.null_sentinel),
            },
            BatchOp::SAdd {
                key: keys::members_key(&insert.table),
                member: key.clone(),
            },
        ])?;

        debug!(table = %insert.table, %key, "inserted record");
        Ok(Outcome::RowsAffected {
            count: 1,
            last_insert_id: generated,
        })
    }

    /// Loads every record of the table in key order and keeps the ones the
    /// filter accepts.
    fn scan(&self, table: &str, filter: Option<&Filter<'_>>) -> Result<Vec<(String, Record)>> {
        let mut members = self.backend.smembers(&keys::members_key(table))?;
        members.sort();

        let mut matched = Vec::new();
        for key in members {
            let fields = self.backend.hgetall(&key)?;
            if fields.is_empty() {
                warn!(table, %key, "membership entry without a record, skipping");
                continue;
            }
            let row = record::decode(fields, &self.config.null_sentinel);
            if filter.is_none_or(|f| f.matches(&row)) {
                trace!(table, %key, "record matched");
                matched.push((key, row));
            }
        }
        Ok(matched)
    }

    fn select(&self, select: &Select) -> Result<RowCursor> {
        let filter = resolve_filter(select.predicate.as_ref())?;
        let schema = self.require_table(&select.table)?;
        require_filter_column(&schema, filter.as_ref())?;

        let columns = match &select.projection {
            Projection::Star => schema.column_names(),
            Projection::Columns(columns) => {
                for column in columns {
                    schema.require_column(column)?;
                }
                columns.clone()
            }
            Projection::CountStar => {
                let count = self.scan(&select.table, filter.as_ref())?.len();
                debug!(table = %select.table, count, "counted records");
                return Ok(RowCursor::new(
                    vec![COUNT_COLUMN.to_string()],
                    vec![vec![Value::Int(count as i64)]],
                ));
            }
        };

        let rows: Vec<Vec<Value>> = self
            .scan(&select.table, filter.as_ref())?
            .into_iter()
            .map(|(_, row)| {
                columns
                    .iter()
                    .map(|column| {
                        let raw = row.get(column).and_then(|v| v.as_deref());
                        Value::decode(raw, schema.column(column).map(|c| c.data_type))
                    })
                    .collect()
            })
            .collect();

        debug!(table = %select.table, rows = rows.len(), "selected records");
        Ok(RowCursor::new(columns, rows))
    }

    fn update(&self, update: &Update) -> Result<Outcome> {
        let new_value = self.stored_value(&update.value)?;
        let filter = resolve_filter(update.predicate.as_ref())?;
        let schema = self.require_table(&update.table)?;
        let column = schema.require_column(&update.column)?;
        if column.auto_increment {
            return Err(Error::validation(format!(
                "AUTO_INCREMENT column {:?} cannot be assigned",
                column.name
            )));
        }
        require_filter_column(&schema, filter.as_ref())?;

        let assignment = record::encode(
            &Record::from([(update.column.clone(), new_value)]),
            &self.config.null_sentinel,
        );

        let mut updated = 0;
        for (key, _) in self.scan(&update.table, filter.as_ref())? {
            self.backend.hset(&key, &assignment)?;
            updated += 1;
        }

        debug!(table = %update.table, updated, "updated records");
        Ok(Outcome::affected(updated))
    }

    fn delete(&self, delete: &Delete) -> Result<Outcome> {
        let filter = resolve_filter(delete.predicate.as_ref())?;
        let schema = self.require_table(&delete.table)?;
        require_filter_column(&schema, filter.as_ref())?;

        let members_key = keys::members_key(&delete.table);
        let mut deleted = 0;
        for (key, _) in self.scan(&delete.table, filter.as_ref())? {
            self.backend.atomic(vec![
                BatchOp::Del { key: key.clone() },
                BatchOp::SRem {
                    key: members_key.clone(),
                    member: key,
                },
            ])?;
            deleted += 1;
        }

        debug!(table = %delete.table, deleted, "deleted records");
        Ok(Outcome::affected(deleted))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::backend::{BackendError, BackendResult, MemoryBackend};
    use crate::data_type::DataType;
    use crate::engine::Engine;
    use crate::error::ErrorKind;
    use crate::schema::ColumnDef;

    /// Wraps a [MemoryBackend], records field-map writes and fails the n-th
    /// write (0-based).
    struct FlakyBackend {
        inner: MemoryBackend,
        reads: AtomicUsize,
        writes: AtomicUsize,
        hsets: parking_lot::Mutex<Vec<HashMap<String, String>>>,
        fail_write: Option<usize>,
    }

    impl FlakyBackend {
        fn new(inner: MemoryBackend, fail_write: Option<usize>) -> Self {
            Self {
                inner,
                reads: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
                hsets: parking_lot::Mutex::new(Vec::new()),
                fail_write,
            }
        }

        fn read(&self) {
            self.reads.fetch_add(1, Ordering::SeqCst);
        }

        fn write(&self) -> BackendResult<()> {
            let n = self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_write == Some(n) {
                return Err(BackendError::Connection("connection reset".into()));
            }
            Ok(())
        }

        fn calls(&self) -> usize {
            self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
        }
    }

    impl KvBackend for FlakyBackend {
        fn get(&self, key: &str) -> BackendResult<Option<String>> {
            self.read();
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> BackendResult<()> {
            self.write()?;
            self.inner.set(key, value)
        }

        fn del(&self, key: &str) -> BackendResult<bool> {
            self.write()?;
            self.inner.del(key)
        }

        fn exists(&self, key: &str) -> BackendResult<bool> {
            self.read();
            self.inner.exists(key)
        }

        fn hgetall(&self, key: &str) -> BackendResult<HashMap<String, String>> {
            self.read();
            self.inner.hgetall(key)
        }

        fn hset(&self, key: &str, fields: &HashMap<String, String>) -> BackendResult<()> {
            self.write()?;
            self.hsets.lock().push(fields.clone());
            self.inner.hset(key, fields)
        }

        fn sadd(&self, key: &str, member: &str) -> BackendResult<bool> {
            self.write()?;
            self.inner.sadd(key, member)
        }

        fn srem(&self, key: &str, member: &str) -> BackendResult<bool> {
            self.write()?;
            self.inner.srem(key, member)
        }

        fn smembers(&self, key: &str) -> BackendResult<Vec<String>> {
            self.read();
            self.inner.smembers(key)
        }

        fn incr(&self, key: &str) -> BackendResult<i64> {
            self.write()?;
            self.inner.incr(key)
        }

        fn atomic(&self, ops: Vec<BatchOp>) -> BackendResult<()> {
            self.write()?;
            self.inner.atomic(ops)
        }
    }

    fn populated(create: &str, inserts: &[&str]) -> MemoryBackend {
        let engine = Engine::new();
        let backend = MemoryBackend::new();
        engine.execute(create, &backend).unwrap();
        for sql in inserts {
            engine.execute(sql, &backend).unwrap();
        }
        backend
    }

    fn three_people() -> MemoryBackend {
        populated(
            "CREATE TABLE people (name TEXT, age INTEGER)",
            &[
                "INSERT INTO people (name, age) VALUES ('a', 30)",
                "INSERT INTO people (name, age) VALUES ('b', 30)",
                "INSERT INTO people (name, age) VALUES ('c', 30)",
            ],
        )
    }

    fn assert_membership_consistent(backend: &MemoryBackend, table: &str) {
        for key in backend.smembers(&keys::members_key(table)).unwrap() {
            assert!(
                !backend.hgetall(&key).unwrap().is_empty(),
                "member {key} has no record"
            );
        }
    }

    #[test]
    fn test_failed_insert_batch_leaves_no_record() {
        let backend = populated(
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTO_INCREMENT, name TEXT)",
            &[],
        );
        // Write 0 is the counter increment, write 1 the record batch.
        let flaky = FlakyBackend::new(backend, Some(1));

        let err = Engine::new()
            .execute("INSERT INTO t (name) VALUES ('x')", &flaky)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);

        let backend = flaky.inner;
        assert_eq!(backend.hgetall("t:1").unwrap(), HashMap::new());
        assert!(backend.smembers("t:keys").unwrap().is_empty());
        // The id is spent even though the record was not written.
        assert_eq!(backend.get("t:counter").unwrap(), Some("1".into()));
    }

    #[test]
    fn test_delete_failure_keeps_processed_records_deleted() {
        let flaky = FlakyBackend::new(three_people(), Some(1));

        let err = Engine::new()
            .execute("DELETE FROM people WHERE age = 30", &flaky)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);

        let backend = flaky.inner;
        assert_eq!(backend.smembers("people:keys").unwrap().len(), 2);
        assert_membership_consistent(&backend, "people");
    }

    #[test]
    fn test_update_failure_keeps_processed_records_updated() {
        let flaky = FlakyBackend::new(three_people(), Some(1));

        let err = Engine::new()
            .execute("UPDATE people SET age = 31 WHERE age = 30", &flaky)
            .unwrap_err();
        assert!(matches!(err, Error::Execution(BackendError::Connection(_))));

        let backend = flaky.inner;
        let engine = Engine::new();
        let count = |age: i64| {
            let mut rows = engine
                .query(
                    &format!("SELECT COUNT(*) FROM people WHERE age = {age}"),
                    &backend,
                )
                .unwrap();
            rows.advance();
            rows.get_i64(COUNT_COLUMN).unwrap()
        };
        assert_eq!(count(31), Some(1));
        assert_eq!(count(30), Some(2));
    }

    #[test]
    fn test_arity_mismatch_touches_nothing() {
        let flaky = FlakyBackend::new(three_people(), None);

        let err = Engine::new()
            .execute("INSERT INTO people (name, age) VALUES ('d')", &flaky)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(flaky.calls(), 0);
    }

    #[test]
    fn test_schema_and_column_errors_precede_writes() {
        let flaky = FlakyBackend::new(three_people(), None);
        let engine = Engine::new();

        for sql in [
            "INSERT INTO missing (a) VALUES (1)",
            "UPDATE missing SET a = 1",
            "DELETE FROM missing",
            "SELECT * FROM missing",
        ] {
            assert_eq!(
                engine.execute(sql, &flaky).unwrap_err().kind(),
                ErrorKind::Schema,
                "{sql}"
            );
        }
        for sql in [
            "INSERT INTO people (nickname) VALUES ('x')",
            "UPDATE people SET nickname = 'x'",
            "DELETE FROM people WHERE nickname = 'x'",
            "SELECT nickname FROM people",
        ] {
            assert_eq!(
                engine.execute(sql, &flaky).unwrap_err().kind(),
                ErrorKind::Validation,
                "{sql}"
            );
        }
        assert_eq!(flaky.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_assigning_auto_increment_column_is_rejected() {
        let backend = populated(
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTO_INCREMENT, name TEXT)",
            &[],
        );
        let err = Engine::new()
            .execute("INSERT INTO t (id, name) VALUES (7, 'x')", &backend)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(backend.get("t:counter").unwrap(), Some("0".into()));
    }

    #[test]
    fn test_insert_without_auto_increment_uses_random_ids() {
        let backend = three_people();
        let members = backend.smembers("people:keys").unwrap();
        assert_eq!(members.len(), 3);
        for key in &members {
            let id = key.strip_prefix("people:").unwrap();
            assert_eq!(id.len(), 32);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_duplicate_insert_column() {
        let backend = three_people();
        let err = Engine::new()
            .execute("INSERT INTO people (name, name) VALUES ('x', 'y')", &backend)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_stale_membership_entry_is_skipped() {
        let backend = three_people();
        backend.sadd("people:keys", "people:gone").unwrap();

        let rows = Engine::new()
            .query("SELECT name FROM people", &backend)
            .unwrap();
        assert_eq!(rows.row_count(), 3);
    }

    struct FixedCatalog(TableSchema);

    impl SchemaCatalog for FixedCatalog {
        fn create_table(&self, name: &str, _: &[ColumnDef], _: bool) -> Result<bool> {
            Err(Error::TableExists {
                table: name.to_string(),
            })
        }

        fn drop_table(&self, _: &str) -> Result<Option<usize>> {
            Ok(None)
        }

        fn columns_of(&self, name: &str) -> Result<Option<TableSchema>> {
            Ok((name == self.0.name).then(|| self.0.clone()))
        }
    }

    #[test]
    fn test_reads_records_written_by_other_tools() {
        let config = EngineConfig::default();
        let catalog = FixedCatalog(TableSchema {
            name: "m".into(),
            columns: BTreeMap::from([
                ("k".into(), ColumnDef::new("k", DataType::Text)),
                ("n".into(), ColumnDef::new("n", DataType::BigInt)),
                ("ok".into(), ColumnDef::new("ok", DataType::Boolean)),
            ]),
        });
        let backend = MemoryBackend::new();
        backend
            .hset(
                "m:x",
                &HashMap::from([
                    ("k".to_string(), "x".to_string()),
                    ("n".to_string(), "12".to_string()),
                    ("ok".to_string(), "true".to_string()),
                ]),
            )
            .unwrap();
        backend.sadd("m:keys", "m:x").unwrap();

        let executor = Executor::new(&backend, &catalog, &config);
        let command = crate::parser::parse("SELECT * FROM m WHERE k = 'x'").unwrap();
        let mut rows = executor.execute(&command).unwrap().into_cursor().unwrap();

        assert_eq!(rows.column_names(), ["k", "n", "ok"]);
        assert!(rows.advance());
        assert_eq!(rows.get(1).unwrap(), &Value::Int(12));
        assert_eq!(rows.get_bool("ok").unwrap(), Some(true));
        assert!(!rows.advance());
    }

    #[test]
    fn test_update_writes_only_the_assigned_field() {
        let flaky = FlakyBackend::new(three_people(), None);

        let updated = Engine::new()
            .execute_update("UPDATE people SET age = NULL WHERE name = 'b'", &flaky)
            .unwrap();
        assert_eq!(updated, 1);

        let config = EngineConfig::default();
        assert_eq!(
            *flaky.hsets.lock(),
            vec![HashMap::from([("age".to_string(), config.null_sentinel)])]
        );

        let mut rows = Engine::new()
            .query("SELECT name, age FROM people WHERE name = 'b'", &flaky.inner)
            .unwrap();
        assert!(rows.advance());
        assert_eq!(rows.get_string("name").unwrap().as_deref(), Some("b"));
        assert_eq!(rows.get_by_name("age").unwrap(), &Value::Null);
    }

    #[test]
    fn test_update_rejects_auto_increment_column() {
        let backend = populated(
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTO_INCREMENT, name TEXT)",
            &["INSERT INTO t (name) VALUES ('x')"],
        );
        let flaky = FlakyBackend::new(backend, None);

        let err = Engine::new()
            .execute("UPDATE t SET id = 7 WHERE name = 'x'", &flaky)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(flaky.writes.load(Ordering::SeqCst), 0);
        assert_eq!(flaky.inner.hgetall("t:1").unwrap()["id"], "1");
    }

    #[test]
    fn test_null_sentinel_text_is_refused() {
        let flaky = FlakyBackend::new(three_people(), None);
        let engine = Engine::new();
        let sentinel = engine.config().null_sentinel.clone();

        let mut insert = engine
            .prepare("INSERT INTO people (name, age) VALUES (?, 1)")
            .unwrap();
        insert.bind(1, sentinel.as_str()).unwrap();
        assert_eq!(
            insert.execute(&flaky).unwrap_err().kind(),
            ErrorKind::Validation
        );

        let mut update = engine.prepare("UPDATE people SET name = ?").unwrap();
        update.bind(1, sentinel).unwrap();
        assert_eq!(
            update.execute(&flaky).unwrap_err().kind(),
            ErrorKind::Validation
        );

        assert_eq!(flaky.calls(), 0);
    }

    #[test]
    fn test_custom_null_sentinel_is_refused_as_literal() {
        let engine = Engine::with_config(EngineConfig {
            null_sentinel: "~".into(),
            ..Default::default()
        })
        .unwrap();
        let backend = MemoryBackend::new();
        engine.execute("CREATE TABLE t (name TEXT)", &backend).unwrap();

        let err = engine
            .execute("INSERT INTO t (name) VALUES ('~')", &backend)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        engine.execute("INSERT INTO t (name) VALUES ('~~')", &backend).unwrap();
        let mut rows = engine.query("SELECT name FROM t", &backend).unwrap();
        assert!(rows.advance());
        assert_eq!(rows.get_string("name").unwrap().as_deref(), Some("~~"));
    }
}
