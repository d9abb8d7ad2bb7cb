use crate::ast::Command;
use crate::backend::KvBackend;
use crate::config::EngineConfig;
use crate::cursor::RowCursor;
use crate::error::{Error, Result};
use crate::executor::{Executor, Outcome};
use crate::parser;
use crate::prepared::PreparedStatement;
use crate::schema::KvSchemaStore;

/// The entry point for running statements against a key-value backend.
///
/// An engine holds configuration only; the backend handle is passed per call
/// and released when the call returns.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine after validating `config`.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs an already parsed command.
    pub fn execute_command<B: KvBackend + ?Sized>(
        &self,
        command: &Command,
        backend: &B,
    ) -> Result<Outcome> {
        let schema = KvSchemaStore::new(backend, &self.config);
        Executor::new(backend, &schema, &self.config).execute(command)
    }

    /// Parses and runs any supported statement.
    ///
    /// # Example
    /// ```
    /// use kvsql::{Engine, MemoryBackend};
    ///
    /// let engine = Engine::new();
    /// let backend = MemoryBackend::new();
    ///
    /// engine
    ///     .execute("CREATE TABLE t (id INTEGER PRIMARY KEY AUTO_INCREMENT, name VARCHAR(255))", &backend)
    ///     .unwrap();
    /// let outcome = engine.execute("INSERT INTO t (name) VALUES ('Ann')", &backend).unwrap();
    /// assert_eq!(outcome.rows_affected(), Some(1));
    /// assert_eq!(outcome.last_insert_id(), Some(1));
    ///
    /// let outcome = engine.execute("SELECT * FROM t WHERE name = 'Ann'", &backend).unwrap();
    /// assert!(outcome.has_result_set());
    /// ```
    pub fn execute<B: KvBackend + ?Sized>(&self, sql: &str, backend: &B) -> Result<Outcome> {
        let command = parser::parse(sql)?;
        self.execute_command(&command, backend)
    }

    /// Runs a statement that does not produce rows and returns the affected
    /// row count.
    ///
    /// # Errors
    /// A SELECT is rejected before it reaches the backend.
    pub fn execute_update<B: KvBackend + ?Sized>(&self, sql: &str, backend: &B) -> Result<u64> {
        let command = parser::parse(sql)?;
        self.update_command(&command, backend)
    }

    pub(crate) fn update_command<B: KvBackend + ?Sized>(
        &self,
        command: &Command,
        backend: &B,
    ) -> Result<u64> {
        if command.is_query() {
            return Err(Error::validation("SELECT returns rows, use query instead"));
        }
        let outcome = self.execute_command(command, backend)?;
        Ok(outcome.rows_affected().unwrap_or(0))
    }

    /// Runs a SELECT and returns its rows.
    ///
    /// # Example
    /// ```
    /// use kvsql::{Engine, MemoryBackend};
    ///
    /// let engine = Engine::new();
    /// let backend = MemoryBackend::new();
    /// engine.execute("CREATE TABLE products (name TEXT, price INTEGER)", &backend).unwrap();
    /// engine.execute("INSERT INTO products (name, price) VALUES ('Mouse', 25)", &backend).unwrap();
    ///
    /// let mut rows = engine.query("SELECT name, price FROM products", &backend).unwrap();
    /// assert_eq!(rows.column_names(), ["name", "price"]);
    /// assert!(rows.advance());
    /// assert_eq!(rows.get_i64("price").unwrap(), Some(25));
    /// ```
    ///
    /// # Errors
    /// Any other statement kind is rejected before it reaches the backend.
    pub fn query<B: KvBackend + ?Sized>(&self, sql: &str, backend: &B) -> Result<RowCursor> {
        let command = parser::parse(sql)?;
        self.query_command(&command, backend)
    }

    pub(crate) fn query_command<B: KvBackend + ?Sized>(
        &self,
        command: &Command,
        backend: &B,
    ) -> Result<RowCursor> {
        if !command.is_query() {
            return Err(Error::validation(
                "statement does not return rows, use execute_update instead",
            ));
        }
        self.execute_command(command, backend)?
            .into_cursor()
            .ok_or_else(|| Error::validation("statement did not return rows"))
    }

    /// Parses `sql` once for repeated execution with `?` parameters.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement> {
        PreparedStatement::new(self.clone(), sql)
    }
}
