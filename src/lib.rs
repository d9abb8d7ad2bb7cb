//! SQL statements translated onto a key-value store.
//!
//! A statement is tokenized, parsed into a [Command], checked against the
//! table schema kept in the store, and executed as hash, set and counter
//! operations on a [KvBackend]. Queries hand back a [RowCursor].
//!
//! ```
//! use kvsql::{Engine, MemoryBackend};
//!
//! let engine = Engine::new();
//! let backend = MemoryBackend::new();
//!
//! engine.execute("CREATE TABLE users (id INTEGER PRIMARY KEY AUTO_INCREMENT, name VARCHAR(255))", &backend).unwrap();
//! engine.execute("INSERT INTO users (name) VALUES ('Ann')", &backend).unwrap();
//! engine.execute("INSERT INTO users (name) VALUES ('Bob')", &backend).unwrap();
//!
//! let mut rows = engine.query("SELECT COUNT(*) FROM users", &backend).unwrap();
//! assert!(rows.advance());
//! assert_eq!(rows.get_i64("count").unwrap(), Some(2));
//! ```

pub mod ast;
pub mod backend;
pub mod config;
pub mod cursor;
pub mod data_type;
pub mod engine;
pub mod error;
pub mod executor;
pub mod keys;
pub mod parser;
pub mod prepared;
pub mod record;
pub mod schema;
pub mod tokenizer;
pub mod value;

pub use ast::Command;
pub use backend::{BackendError, BatchOp, KvBackend, MemoryBackend};
pub use config::EngineConfig;
pub use cursor::RowCursor;
pub use data_type::DataType;
pub use engine::Engine;
pub use error::{Error, ErrorKind, Result};
pub use executor::Outcome;
pub use parser::parse;
pub use prepared::{Param, PreparedStatement};
pub use schema::{ColumnDef, KvSchemaStore, SchemaCatalog, TableSchema};
pub use value::Value;

/// Runs a parsed command with the default configuration.
pub fn execute<B: KvBackend + ?Sized>(command: &Command, backend: &B) -> Result<Outcome> {
    Engine::new().execute_command(command, backend)
}
