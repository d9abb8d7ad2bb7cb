//! Statements parsed once and run with positional `?` parameters.

use crate::ast::{Command, Literal};
use crate::backend::KvBackend;
use crate::cursor::RowCursor;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::executor::Outcome;
use crate::parser;

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Param {
    fn into_literal(self) -> Result<Literal> {
        match self {
            Self::Null => Ok(Literal::Null),
            Self::Text(s) => Ok(Literal::String(s)),
            Self::Int(i) => Ok(Literal::Number(i.to_string())),
            Self::Float(f) if f.is_finite() => Ok(Literal::Number(f.to_string())),
            Self::Float(f) => Err(Error::validation(format!("cannot bind non-finite float {f}"))),
            Self::Bool(b) => Ok(Literal::Bool(b)),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A parsed statement with `?` placeholders numbered from 1.
///
/// Bound values are substituted into the parsed command, never spliced into
/// the statement text, so a bound string cannot change the statement's shape.
///
/// # Example
/// ```
/// use kvsql::{Engine, MemoryBackend};
///
/// let engine = Engine::new();
/// let backend = MemoryBackend::new();
/// engine.execute("CREATE TABLE t (name TEXT, age INTEGER)", &backend).unwrap();
///
/// let mut insert = engine.prepare("INSERT INTO t (name, age) VALUES (?, ?)").unwrap();
/// insert.bind(1, "O'Brien").unwrap();
/// insert.bind(2, 41).unwrap();
/// assert_eq!(insert.execute_update(&backend).unwrap(), 1);
///
/// let mut select = engine.prepare("SELECT age FROM t WHERE name = ?").unwrap();
/// select.bind(1, "O'Brien").unwrap();
/// let mut rows = select.query(&backend).unwrap();
/// assert!(rows.advance());
/// assert_eq!(rows.get_i64("age").unwrap(), Some(41));
/// ```
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    engine: Engine,
    command: Command,
    params: Vec<Option<Literal>>,
}

impl PreparedStatement {
    pub(crate) fn new(engine: Engine, sql: &str) -> Result<Self> {
        let mut command = parser::parse(sql)?;
        let count = command.param_count();
        Ok(Self {
            engine,
            command,
            params: vec![None; count],
        })
    }

    /// Number of `?` placeholders.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Binds the 1-based placeholder `index`, replacing any earlier value.
    pub fn bind(&mut self, index: usize, value: impl Into<Param>) -> Result<()> {
        let count = self.params.len();
        let slot = index
            .checked_sub(1)
            .and_then(|i| self.params.get_mut(i))
            .ok_or_else(|| {
                Error::validation(format!(
                    "parameter index {index} out of range, statement has {count}"
                ))
            })?;
        let param: Param = value.into();
        *slot = Some(param.into_literal()?);
        Ok(())
    }

    pub fn clear_parameters(&mut self) {
        self.params.iter_mut().for_each(|p| *p = None);
    }

    /// The command with every placeholder replaced by its bound value.
    ///
    /// # Errors
    /// [Error::UnboundParameter] for the first placeholder without a value.
    pub fn bound_command(&self) -> Result<Command> {
        let mut command = self.command.clone();
        for literal in command.literals_mut() {
            if let Literal::Param(index) = *literal {
                *literal = self.params[index - 1]
                    .clone()
                    .ok_or(Error::UnboundParameter { index })?;
            }
        }
        Ok(command)
    }

    pub fn execute<B: KvBackend + ?Sized>(&self, backend: &B) -> Result<Outcome> {
        self.engine.execute_command(&self.bound_command()?, backend)
    }

    pub fn execute_update<B: KvBackend + ?Sized>(&self, backend: &B) -> Result<u64> {
        self.engine.update_command(&self.bound_command()?, backend)
    }

    pub fn query<B: KvBackend + ?Sized>(&self, backend: &B) -> Result<RowCursor> {
        self.engine.query_command(&self.bound_command()?, backend)
    }
}
