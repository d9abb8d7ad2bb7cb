use crate::error::{Error, Result};

/// Represents the smallest meaningful units (atoms) of the SQL subset.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // --- SQL Keywords ---
    Create,
    Drop,
    Table,
    If,
    Not,
    Exists,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    Update,
    Set,
    Delete,
    Count,
    Null,
    Primary,
    Key,
    AutoIncrement,
    // Recognized only so the parser can reject them by name.
    And,
    Or,
    Like,
    In,
    Between,

    // --- Data Types ---
    Integer,
    BigInt,
    Varchar,
    Text,
    Timestamp,
    Boolean,
    Double,

    // --- Identifiers & Literals ---
    /// A name representing a table or a column (e.g., `users`, `id`).
    Ident(String),
    /// A numeric literal exactly as written (e.g., `42`, `-3.5`).
    Number(String),
    /// A string literal between single quotes, with `''` unescaped.
    String(String),
    /// The boolean literal `TRUE`.
    True,
    /// The boolean literal `FALSE`.
    False,
    /// A positional parameter placeholder `?`.
    Param,

    // --- Symbols ---
    /// Left parenthesis `(`
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// Comma `,`
    Comma,
    /// Semicolon `;`
    Semicolon,
    /// Wildcard `*`
    Star,
    /// Greater than
    Greater,
    /// Lower than
    Lower,
    /// Equal to
    Equal,
    /// `!=` or `<>`
    NotEqual,

    // --- Special ---
    /// Represents the End Of File/Input.
    Eof,
}

impl Token {
    /// Keywords that only carry meaning in a fixed position, so they can
    /// still name a table or column elsewhere (`key`, `count`, `text`, ...).
    pub fn is_soft_keyword(&self) -> bool {
        matches!(
            self,
            Self::Count
                | Self::Key
                | Self::Primary
                | Self::AutoIncrement
                | Self::Like
                | Self::In
                | Self::Between
                | Self::Integer
                | Self::BigInt
                | Self::Varchar
                | Self::Text
                | Self::Timestamp
                | Self::Boolean
                | Self::Double
        )
    }
}

/// A lexical scanner that converts raw statement text into [Token]s.
pub struct Tokenizer {
    /// The input string stored as a vector of characters for easy iteration.
    input: Vec<char>,
    /// The current position in the character vector.
    position: usize,
}

impl Tokenizer {
    /// Creates a new Tokenizer for the given input string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns a vector of tokens ending in
    /// [Token::Eof].
    ///
    /// # Errors
    /// Returns a parse error on an unsupported character or a malformed
    /// literal.
    ///
    /// # Example
    /// ```
    /// # use kvsql::tokenizer::{Tokenizer, Token};
    /// let tokens = Tokenizer::new("select *").tokenize().unwrap();
    /// assert_eq!(tokens[0], Token::Select);
    /// ```
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        Ok(self
            .tokenize_spelled()?
            .into_iter()
            .map(|(token, _)| token)
            .collect())
    }

    /// Like [Tokenizer::tokenize], pairing each token with its text as
    /// written in the input.
    pub fn tokenize_spelled(&mut self) -> Result<Vec<(Token, String)>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }
            let start = self.position;
            let token = self.next_token()?;
            tokens.push((token, self.input[start..self.position].iter().collect()));
        }

        tokens.push((Token::Eof, String::new()));
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        let single = match ch {
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '*' => Some(Token::Star),
            '=' => Some(Token::Equal),
            '?' => Some(Token::Param),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match ch {
            '<' => {
                self.advance();
                if self.eat('>') {
                    return Ok(Token::NotEqual);
                }
                self.eat('=');
                Ok(Token::Lower)
            }
            '>' => {
                self.advance();
                self.eat('=');
                Ok(Token::Greater)
            }
            '!' => {
                self.advance();
                if self.eat('=') {
                    Ok(Token::NotEqual)
                } else {
                    Err(Error::parse("expected '=' after '!'"))
                }
            }
            '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            c if c.is_ascii_digit() => self.read_number(),
            '\'' => self.read_string(),
            _ => Err(Error::parse(format!("character {ch:?} is not supported"))),
        }
    }

    // --- Navigation Helpers ---

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    /// Consumes `expected` if it is the current character.
    fn eat(&mut self, expected: char) -> bool {
        if !self.is_at_end() && self.current_char() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    // --- Extraction Logic ---

    /// Reads a word and classifies it as a keyword (case-insensitive) or an
    /// identifier (case preserved).
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_ascii_uppercase().as_str() {
            "CREATE" => Token::Create,
            "DROP" => Token::Drop,
            "TABLE" => Token::Table,
            "IF" => Token::If,
            "NOT" => Token::Not,
            "EXISTS" => Token::Exists,
            "INSERT" => Token::Insert,
            "INTO" => Token::Into,
            "VALUES" => Token::Values,
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "UPDATE" => Token::Update,
            "SET" => Token::Set,
            "DELETE" => Token::Delete,
            "COUNT" => Token::Count,
            "NULL" => Token::Null,
            "PRIMARY" => Token::Primary,
            "KEY" => Token::Key,
            "AUTO_INCREMENT" | "AUTOINCREMENT" => Token::AutoIncrement,
            "AND" => Token::And,
            "OR" => Token::Or,
            "LIKE" => Token::Like,
            "IN" => Token::In,
            "BETWEEN" => Token::Between,
            "INTEGER" | "INT" => Token::Integer,
            "BIGINT" => Token::BigInt,
            "VARCHAR" => Token::Varchar,
            "TEXT" => Token::Text,
            "TIMESTAMP" => Token::Timestamp,
            "BOOLEAN" | "BOOL" => Token::Boolean,
            "DOUBLE" => Token::Double,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            _ => Token::Ident(ident),
        }
    }

    /// Reads a numeric literal, keeping its exact spelling.
    fn read_number(&mut self) -> Result<Token> {
        let mut number = String::new();
        let mut has_dot = false;

        if self.current_char() == '-' {
            number.push('-');
            self.advance();
        }

        while !self.is_at_end()
            && (self.current_char().is_ascii_digit() || (self.current_char() == '.' && !has_dot))
        {
            if self.current_char() == '.' {
                has_dot = true;
            }
            number.push(self.current_char());
            self.advance();
        }

        if !self.is_at_end() && self.current_char() == '.' {
            return Err(Error::parse("multiple dots are not allowed in a number"));
        }
        if !self.is_at_end() && (self.current_char().is_alphabetic() || self.current_char() == '_') {
            return Err(Error::parse(format!(
                "invalid character {:?} in number {number:?}",
                self.current_char()
            )));
        }

        Ok(Token::Number(number))
    }

    /// Reads a string literal enclosed in single quotes; `''` stands for one
    /// quote inside the literal.
    fn read_string(&mut self) -> Result<Token> {
        self.advance(); // Skip the opening quote

        let mut string = String::new();
        loop {
            if self.is_at_end() {
                return Err(Error::parse("unterminated string"));
            }
            let ch = self.current_char();
            self.advance();
            if ch == '\'' {
                if self.eat('\'') {
                    string.push('\'');
                    continue;
                }
                break;
            }
            string.push(ch);
        }

        Ok(Token::String(string))
    }
}
