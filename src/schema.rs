use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::backend::{BatchOp, KvBackend};
use crate::config::EngineConfig;
use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::keys;

/// Column definition in the schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub auto_increment: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            auto_increment: false,
        }
    }

    /// The value persisted in the column map: declared type plus markers,
    /// e.g. `INTEGER PRIMARY KEY AUTO_INCREMENT`.
    pub fn type_spec(&self) -> String {
        let mut spec = self.data_type.to_string();
        if self.primary_key {
            spec.push_str(" PRIMARY KEY");
        }
        if self.auto_increment {
            spec.push_str(" AUTO_INCREMENT");
        }
        spec
    }

    /// Rebuilds a definition from a persisted [ColumnDef::type_spec].
    pub fn from_type_spec(name: &str, spec: &str) -> Result<Self> {
        let upper = spec.to_ascii_uppercase();
        let mut rest = upper.as_str();
        let mut column = ColumnDef::new(name, DataType::Text);

        if let Some(stripped) = rest.strip_suffix(" AUTO_INCREMENT") {
            column.auto_increment = true;
            rest = stripped;
        }
        if let Some(stripped) = rest.strip_suffix(" PRIMARY KEY") {
            column.primary_key = true;
            rest = stripped;
        }
        column.data_type = rest.parse()?;
        Ok(column)
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.type_spec())
    }
}

/// The persisted shape of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    /// Keyed by column name, so iteration order is lexicographic.
    pub columns: BTreeMap<String, ColumnDef>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn auto_increment_column(&self) -> Option<&ColumnDef> {
        self.columns.values().find(|c| c.auto_increment)
    }

    /// Looks up `name`, failing with a validation error if the table lacks it.
    pub fn require_column(&self, name: &str) -> Result<&ColumnDef> {
        self.column(name).ok_or_else(|| {
            Error::validation(format!(
                "column {name:?} does not exist in table {:?}",
                self.name
            ))
        })
    }
}

/// Table existence and shape, as the executor sees it.
pub trait SchemaCatalog {
    /// Persists a new table. Returns `false` when the table already existed
    /// and `if_not_exists` made that acceptable.
    fn create_table(&self, name: &str, columns: &[ColumnDef], if_not_exists: bool) -> Result<bool>;

    /// Removes the table with all its records. Returns the number of records
    /// removed, or `None` if the table did not exist.
    fn drop_table(&self, name: &str) -> Result<Option<usize>>;

    /// The table's columns, or `None` if it does not exist.
    fn columns_of(&self, name: &str) -> Result<Option<TableSchema>>;
}

/// [SchemaCatalog] kept in the same backend as the records.
pub struct KvSchemaStore<'a, B: KvBackend + ?Sized> {
    backend: &'a B,
    config: &'a EngineConfig,
}

impl<'a, B: KvBackend + ?Sized> KvSchemaStore<'a, B> {
    pub fn new(backend: &'a B, config: &'a EngineConfig) -> Self {
        Self { backend, config }
    }
}

fn validate_columns(table: &str, columns: &[ColumnDef]) -> Result<()> {
    if table == keys::SCHEMA_NAMESPACE {
        return Err(Error::validation(format!(
            "table name {table:?} is reserved for schema entries"
        )));
    }
    if columns.is_empty() {
        return Err(Error::validation(format!("table {table:?} declares no columns")));
    }

    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.name.as_str()) {
            return Err(Error::validation(format!(
                "column {:?} is declared twice",
                column.name
            )));
        }
    }

    let auto: Vec<&ColumnDef> = columns.iter().filter(|c| c.auto_increment).collect();
    if auto.len() > 1 {
        return Err(Error::validation(format!(
            "table {table:?} declares more than one AUTO_INCREMENT column"
        )));
    }
    if let Some(column) = auto.iter().find(|c| !c.data_type.is_integer()) {
        return Err(Error::validation(format!(
            "AUTO_INCREMENT column {:?} must be INTEGER or BIGINT",
            column.name
        )));
    }
    Ok(())
}

impl<B: KvBackend + ?Sized> SchemaCatalog for KvSchemaStore<'_, B> {
    fn create_table(&self, name: &str, columns: &[ColumnDef], if_not_exists: bool) -> Result<bool> {
        validate_columns(name, columns)?;

        if self.columns_of(name)?.is_some() {
            if if_not_exists {
                debug!(table = name, "table already exists, skipping create");
                return Ok(false);
            }
            return Err(Error::TableExists {
                table: name.to_string(),
            });
        }

        let fields: HashMap<String, String> = columns
            .iter()
            .map(|c| (c.name.clone(), c.type_spec()))
            .collect();

        let mut ops = vec![BatchOp::HSet {
            key: keys::columns_key(name),
            fields,
        }];
        if columns.iter().any(|c| c.auto_increment) {
            ops.push(BatchOp::Set {
                key: keys::counter_key(name),
                value: "0".to_string(),
            });
        }
        if self.config.record_schema_text {
            let text = columns
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            ops.push(BatchOp::Set {
                key: keys::schema_key(name),
                value: text,
            });
        }

        self.backend.atomic(ops)?;
        debug!(table = name, columns = columns.len(), "created table");
        Ok(true)
    }

    fn drop_table(&self, name: &str) -> Result<Option<usize>> {
        if self.columns_of(name)?.is_none() {
            return Ok(None);
        }

        let members = self.backend.smembers(&keys::members_key(name))?;
        let removed = members.len();

        let mut ops: Vec<BatchOp> = members
            .into_iter()
            .map(|key| BatchOp::Del { key })
            .collect();
        for key in [
            keys::columns_key(name),
            keys::counter_key(name),
            keys::members_key(name),
            keys::schema_key(name),
        ] {
            ops.push(BatchOp::Del { key });
        }

        self.backend.atomic(ops)?;
        debug!(table = name, records = removed, "dropped table");
        Ok(Some(removed))
    }

    fn columns_of(&self, name: &str) -> Result<Option<TableSchema>> {
        let fields = self.backend.hgetall(&keys::columns_key(name))?;
        if fields.is_empty() {
            return Ok(None);
        }

        let columns = fields
            .iter()
            .map(|(column, spec)| {
                ColumnDef::from_type_spec(column, spec).map(|def| (column.clone(), def))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Some(TableSchema {
            name: name.to_string(),
            columns,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn users_columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef {
                name: "id".into(),
                data_type: DataType::Integer,
                primary_key: true,
                auto_increment: true,
            },
            ColumnDef::new("name", DataType::Varchar(Some(255))),
        ]
    }

    #[test]
    fn test_type_spec_round_trip() {
        for column in users_columns() {
            let spec = column.type_spec();
            assert_eq!(ColumnDef::from_type_spec(&column.name, &spec).unwrap(), column);
        }
        assert_eq!(
            users_columns()[0].to_string(),
            "id INTEGER PRIMARY KEY AUTO_INCREMENT"
        );
    }

    #[test]
    fn test_create_persists_columns_counter_and_text() {
        let backend = MemoryBackend::new();
        let config = EngineConfig::default();
        let store = KvSchemaStore::new(&backend, &config);

        assert!(store.create_table("users", &users_columns(), false).unwrap());

        assert_eq!(backend.get("users:counter").unwrap(), Some("0".into()));
        assert_eq!(
            backend.get("schema:users").unwrap(),
            Some("id INTEGER PRIMARY KEY AUTO_INCREMENT, name VARCHAR(255)".into())
        );

        let schema = store.columns_of("users").unwrap().unwrap();
        assert_eq!(schema.column_names(), vec!["id", "name"]);
        assert_eq!(schema.auto_increment_column().unwrap().name, "id");
    }

    #[test]
    fn test_create_without_auto_increment_has_no_counter() {
        let backend = MemoryBackend::new();
        let config = EngineConfig {
            record_schema_text: false,
            ..Default::default()
        };
        let store = KvSchemaStore::new(&backend, &config);

        store
            .create_table("logs", &[ColumnDef::new("msg", DataType::Text)], false)
            .unwrap();

        assert_eq!(backend.keys(), vec!["logs:columns"]);
    }

    #[test]
    fn test_create_existing_table() {
        let backend = MemoryBackend::new();
        let config = EngineConfig::default();
        let store = KvSchemaStore::new(&backend, &config);

        store.create_table("users", &users_columns(), false).unwrap();

        assert!(matches!(
            store.create_table("users", &users_columns(), false),
            Err(Error::TableExists { .. })
        ));
        // The new definition is not compared with the stored one.
        let other = [ColumnDef::new("other", DataType::Text)];
        assert!(!store.create_table("users", &other, true).unwrap());
        assert!(store.columns_of("users").unwrap().unwrap().has_column("name"));
    }

    #[test]
    fn test_create_rejects_bad_definitions() {
        let backend = MemoryBackend::new();
        let config = EngineConfig::default();
        let store = KvSchemaStore::new(&backend, &config);

        let twice = [
            ColumnDef::new("a", DataType::Text),
            ColumnDef::new("a", DataType::Integer),
        ];
        assert!(store.create_table("t", &twice, false).is_err());

        let mut auto = ColumnDef::new("a", DataType::Integer);
        auto.auto_increment = true;
        let mut auto2 = ColumnDef::new("b", DataType::BigInt);
        auto2.auto_increment = true;
        assert!(store.create_table("t", &[auto, auto2], false).is_err());

        let mut text_auto = ColumnDef::new("a", DataType::Text);
        text_auto.auto_increment = true;
        assert!(store.create_table("t", &[text_auto], false).is_err());

        assert!(backend.keys().is_empty());
    }

    #[test]
    fn test_schema_table_name_is_reserved() {
        let backend = MemoryBackend::new();
        let config = EngineConfig::default();
        let store = KvSchemaStore::new(&backend, &config);
        let columns = [ColumnDef::new("a", DataType::Text)];

        for if_not_exists in [false, true] {
            let err = store.create_table("schema", &columns, if_not_exists).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        }
        assert!(backend.keys().is_empty());

        // Tables named after the per-table key suffixes stay independent.
        store.create_table("keys", &columns, false).unwrap();
        store.create_table("columns", &columns, false).unwrap();
        assert_eq!(store.drop_table("keys").unwrap(), Some(0));
        assert!(store.columns_of("columns").unwrap().is_some());
        assert_eq!(
            backend.get("schema:columns").unwrap().as_deref(),
            Some("a TEXT")
        );
    }

    #[test]
    fn test_drop_removes_everything() {
        let backend = MemoryBackend::new();
        let config = EngineConfig::default();
        let store = KvSchemaStore::new(&backend, &config);

        store.create_table("users", &users_columns(), false).unwrap();
        backend
            .hset("users:1", &HashMap::from([("name".to_string(), "Ann".to_string())]))
            .unwrap();
        backend.sadd("users:keys", "users:1").unwrap();

        assert_eq!(store.drop_table("users").unwrap(), Some(1));
        assert!(backend.keys().is_empty());
        assert_eq!(store.drop_table("users").unwrap(), None);
        assert!(store.columns_of("users").unwrap().is_none());
    }
}
