use crate::error::{Error, Result};
use crate::schema::ColumnDef;

/// A parsed statement, one variant per recognized shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTable(CreateTable),
    DropTable(DropTable),
    Insert(Insert),
    Select(Select),
    Update(Update),
    Delete(Delete),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub name: String,
    pub if_exists: bool,
}

/// `INSERT INTO table (columns) VALUES (values)`. Arity is checked at
/// execution, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Literal>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Star,
    Columns(Vec<String>),
    CountStar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub projection: Projection,
    pub table: String,
    pub predicate: Option<Predicate>,
}

/// `UPDATE table SET column = value [WHERE ...]`; exactly one assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub column: String,
    pub value: Literal,
    pub predicate: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub predicate: Option<Predicate>,
}

/// The single `column = literal` test a WHERE clause may carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub value: Literal,
}

/// A literal operand as written in the statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    /// Quoted string, quotes already stripped.
    String(String),
    /// Numeric text exactly as written.
    Number(String),
    Bool(bool),
    /// `?` placeholder, numbered from 1 in textual order.
    Param(usize),
}

impl Literal {
    /// The text a record stores for this literal; `None` is SQL NULL.
    ///
    /// # Errors
    /// Fails with [Error::UnboundParameter] on a placeholder.
    pub fn to_stored(&self) -> Result<Option<String>> {
        match self {
            Self::Null => Ok(None),
            Self::String(s) | Self::Number(s) => Ok(Some(s.clone())),
            Self::Bool(b) => Ok(Some(b.to_string())),
            Self::Param(index) => Err(Error::UnboundParameter { index: *index }),
        }
    }
}

impl Command {
    /// Name of the table the statement targets.
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable(c) => &c.name,
            Self::DropTable(d) => &d.name,
            Self::Insert(i) => &i.table,
            Self::Select(s) => &s.table,
            Self::Update(u) => &u.table,
            Self::Delete(d) => &d.table,
        }
    }

    /// Whether executing this statement yields rows.
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Select(_))
    }

    /// Every literal operand, in textual order.
    pub fn literals_mut(&mut self) -> Vec<&mut Literal> {
        fn predicate(p: &mut Option<Predicate>) -> Option<&mut Literal> {
            p.as_mut().map(|p| &mut p.value)
        }

        match self {
            Self::CreateTable(_) | Self::DropTable(_) => Vec::new(),
            Self::Insert(insert) => insert.values.iter_mut().collect(),
            Self::Select(select) => predicate(&mut select.predicate).into_iter().collect(),
            Self::Update(update) => std::iter::once(&mut update.value)
                .chain(predicate(&mut update.predicate))
                .collect(),
            Self::Delete(delete) => predicate(&mut delete.predicate).into_iter().collect(),
        }
    }

    /// Number of `?` placeholders in the statement.
    pub fn param_count(&mut self) -> usize {
        self.literals_mut()
            .iter()
            .filter(|l| matches!(l, Literal::Param(_)))
            .count()
    }
}
