use crate::ast::*;
use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::schema::ColumnDef;
use crate::tokenizer::{Token, Tokenizer};

/// Recursive-descent parser over the six supported statement shapes.
pub struct Parser {
    tokens: Vec<Token>,
    /// Source text of each token, for keywords used as names.
    spellings: Vec<String>,
    position: usize,
    /// Placeholders seen so far; the next `?` gets this plus one.
    params: usize,
}

/// Tokenizes and parses a single statement.
///
/// # Example
/// ```
/// use kvsql::ast::{Command, Projection};
///
/// let command = kvsql::parse("SELECT COUNT(*) FROM users WHERE name = 'Ann'").unwrap();
/// let Command::Select(select) = command else { panic!() };
/// assert_eq!(select.projection, Projection::CountStar);
/// assert_eq!(select.predicate.unwrap().column, "name");
/// ```
pub fn parse(sql: &str) -> Result<Command> {
    let tokens = Tokenizer::new(sql).tokenize_spelled()?;
    Parser::new(tokens).parse()
}

impl Parser {
    pub fn new(tokens: Vec<(Token, String)>) -> Self {
        let (tokens, spellings) = tokens.into_iter().unzip();
        Self {
            tokens,
            spellings,
            position: 0,
            params: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Command> {
        let command = match self.current_token() {
            Token::Create => self.parse_create_table(),
            Token::Drop => self.parse_drop_table(),
            Token::Insert => self.parse_insert(),
            Token::Select => self.parse_select(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            token => Err(Error::parse(format!("unsupported statement starting with {token:?}"))),
        }?;

        // semicolon is optional
        if matches!(self.current_token(), Token::Semicolon) {
            self.advance();
        }

        if !self.is_at_end() {
            return Err(Error::parse(format!(
                "unexpected token after statement: {:?}",
                self.current_token()
            )));
        }

        Ok(command)
    }

    //helpers
    fn current_token(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn consume(&mut self, expected: Token) -> Result<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(Error::parse(format!(
                "expected {:?}, found {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    /// Consumes `expected` if present.
    fn eat(&mut self, expected: Token) -> bool {
        if *self.current_token() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Takes a name. Soft keywords are accepted as written.
    fn consume_ident(&mut self) -> Result<String> {
        let name = match self.current_token() {
            Token::Ident(name) => name.clone(),
            token if token.is_soft_keyword() => self.spellings[self.position].clone(),
            token => return Err(Error::parse(format!("expected identifier, found {token:?}"))),
        };
        self.advance();
        Ok(name)
    }

    fn next_is(&self, expected: &Token) -> bool {
        self.tokens.get(self.position + 1) == Some(expected)
    }

    /// `ident {, ident}` inside parentheses.
    fn parse_ident_list(&mut self) -> Result<Vec<String>> {
        self.consume(Token::LeftParen)?;
        let mut idents = vec![self.consume_ident()?];
        while self.eat(Token::Comma) {
            idents.push(self.consume_ident()?);
        }
        self.consume(Token::RightParen)?;
        Ok(idents)
    }

    fn consume_data_type(&mut self) -> Result<DataType> {
        let data_type = match self.current_token() {
            Token::Integer => DataType::Integer,
            Token::BigInt => DataType::BigInt,
            Token::Text => DataType::Text,
            Token::Timestamp => DataType::Timestamp,
            Token::Boolean => DataType::Boolean,
            Token::Double => DataType::Double,
            Token::Varchar => {
                self.advance();
                if !self.eat(Token::LeftParen) {
                    return Ok(DataType::Varchar(None));
                }
                let len = match self.current_token() {
                    Token::Number(n) => n
                        .parse::<u32>()
                        .map_err(|_| Error::parse(format!("invalid VARCHAR length {n:?}")))?,
                    token => {
                        return Err(Error::parse(format!(
                            "expected VARCHAR length, found {token:?}"
                        )));
                    }
                };
                self.advance();
                self.consume(Token::RightParen)?;
                return Ok(DataType::Varchar(Some(len)));
            }
            token => {
                return Err(Error::parse(format!("{token:?} is not a column type")));
            }
        };
        self.advance();
        Ok(data_type)
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.consume_ident()?;
        let data_type = self.consume_data_type()?;
        let mut column = ColumnDef::new(name, data_type);

        loop {
            match self.current_token() {
                Token::Primary => {
                    self.advance();
                    self.consume(Token::Key)?;
                    column.primary_key = true;
                }
                Token::AutoIncrement => {
                    self.advance();
                    column.auto_increment = true;
                }
                Token::Comma | Token::RightParen => break,
                token => {
                    return Err(Error::parse(format!(
                        "unsupported column constraint {token:?} on {:?}",
                        column.name
                    )));
                }
            }
        }

        Ok(column)
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        let literal = match self.current_token() {
            Token::String(s) => Literal::String(s.clone()),
            Token::Number(n) => Literal::Number(n.clone()),
            Token::Null => Literal::Null,
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Param => {
                self.params += 1;
                Literal::Param(self.params)
            }
            token => return Err(Error::parse(format!("expected a literal, found {token:?}"))),
        };
        self.advance();
        Ok(literal)
    }

    /// `[WHERE column = literal]`. Anything richer is rejected by name.
    fn parse_where(&mut self) -> Result<Option<Predicate>> {
        if !self.eat(Token::Where) {
            return Ok(None);
        }

        let column = self.consume_ident()?;
        let op = self.current_token().clone();
        match op {
            Token::Equal => self.advance(),
            Token::Greater
            | Token::Lower
            | Token::NotEqual
            | Token::Like
            | Token::In
            | Token::Between
            | Token::Not => {
                return Err(Error::parse(format!(
                    "only `column = value` predicates are supported, found {op:?}"
                )));
            }
            _ => return Err(Error::parse(format!("expected '=', found {op:?}"))),
        }
        let value = self.parse_literal()?;

        let next = self.current_token();
        if matches!(next, Token::And | Token::Or) {
            return Err(Error::parse(format!(
                "compound predicates are not supported, found {next:?}"
            )));
        }

        Ok(Some(Predicate { column, value }))
    }

    fn parse_create_table(&mut self) -> Result<Command> {
        self.consume(Token::Create)?;
        self.consume(Token::Table)?;
        let if_not_exists = if self.eat(Token::If) {
            self.consume(Token::Not)?;
            self.consume(Token::Exists)?;
            true
        } else {
            false
        };
        let name = self.consume_ident()?;

        self.consume(Token::LeftParen)?;
        let mut columns = vec![];
        loop {
            columns.push(self.parse_column_def()?);
            match self.current_token() {
                Token::RightParen => {
                    self.advance();
                    break;
                }
                Token::Comma => {
                    self.advance();
                    continue;
                }
                _ => return Err(Error::parse("expected ',' or ')'")),
            }
        }

        Ok(Command::CreateTable(CreateTable {
            name,
            if_not_exists,
            columns,
        }))
    }

    fn parse_drop_table(&mut self) -> Result<Command> {
        self.consume(Token::Drop)?;
        self.consume(Token::Table)?;
        let if_exists = if self.eat(Token::If) {
            self.consume(Token::Exists)?;
            true
        } else {
            false
        };
        let name = self.consume_ident()?;
        Ok(Command::DropTable(DropTable { name, if_exists }))
    }

    fn parse_insert(&mut self) -> Result<Command> {
        self.consume(Token::Insert)?;
        self.consume(Token::Into)?;
        let table = self.consume_ident()?;
        let columns = self.parse_ident_list()?;

        self.consume(Token::Values)?;
        self.consume(Token::LeftParen)?;
        let mut values = vec![self.parse_literal()?];
        while self.eat(Token::Comma) {
            values.push(self.parse_literal()?);
        }
        self.consume(Token::RightParen)?;

        Ok(Command::Insert(Insert {
            table,
            columns,
            values,
        }))
    }

    fn parse_projection(&mut self) -> Result<Projection> {
        if self.eat(Token::Star) {
            return Ok(Projection::Star);
        }
        if *self.current_token() == Token::Count && self.next_is(&Token::LeftParen) {
            self.advance();
            self.consume(Token::LeftParen)?;
            self.consume(Token::Star)?;
            self.consume(Token::RightParen)?;
            return Ok(Projection::CountStar);
        }

        let mut columns = vec![self.consume_ident()?];
        while self.eat(Token::Comma) {
            columns.push(self.consume_ident()?);
        }
        Ok(Projection::Columns(columns))
    }

    fn parse_select(&mut self) -> Result<Command> {
        self.consume(Token::Select)?;
        let projection = self.parse_projection()?;
        self.consume(Token::From)?;
        let table = self.consume_ident()?;
        let predicate = self.parse_where()?;

        Ok(Command::Select(Select {
            projection,
            table,
            predicate,
        }))
    }

    fn parse_update(&mut self) -> Result<Command> {
        self.consume(Token::Update)?;
        let table = self.consume_ident()?;
        self.consume(Token::Set)?;
        let column = self.consume_ident()?;
        self.consume(Token::Equal)?;
        let value = self.parse_literal()?;

        if matches!(self.current_token(), Token::Comma) {
            return Err(Error::parse("only one SET assignment is supported"));
        }

        let predicate = self.parse_where()?;
        Ok(Command::Update(Update {
            table,
            column,
            value,
            predicate,
        }))
    }

    fn parse_delete(&mut self) -> Result<Command> {
        self.consume(Token::Delete)?;
        self.consume(Token::From)?;
        let table = self.consume_ident()?;
        let predicate = self.parse_where()?;
        Ok(Command::Delete(Delete { table, predicate }))
    }
}
