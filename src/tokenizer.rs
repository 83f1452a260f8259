use crate::error::{Error, Result};

/// Lexical units of a predicate such as `age >= 30` or `name = 'Ann'`.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A column name or a bare word (e.g., `age`, `Engineer`).
    Ident(String),
    /// A 64-bit integer literal (e.g., `42`, `-7`).
    Number(i64),
    /// A 64-bit floating-point literal (e.g., `3.14`).
    FloatNumber(f64),
    /// A string literal between single or double quotes.
    String(String),
    /// The literal `NULL`.
    Null,
    True,
    False,

    // --- Operators ---
    Equal,
    NotEqual,
    Lower,
    Greater,
    LowerEqual,
    GreaterEqual,

    /// End of input.
    Eof,
}

impl Token {
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::Equal
                | Token::NotEqual
                | Token::Lower
                | Token::Greater
                | Token::LowerEqual
                | Token::GreaterEqual
        )
    }
}

/// Scans predicate text into [Token]s.
pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns a vector of tokens.
    ///
    /// # Errors
    /// Returns [Error::Syntax] on an unsupported character or a malformed
    /// literal.
    ///
    /// # Example
    /// ```
    /// # use sqlito::tokenizer::{Tokenizer, Token};
    /// let tokens = Tokenizer::new("age>=30").tokenize().unwrap();
    /// assert_eq!(tokens[1], Token::GreaterEqual);
    /// ```
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.scan()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    /// Reads the next token, skipping leading whitespace. Returns
    /// [Token::Eof] once the input is exhausted, and keeps returning it.
    pub fn scan(&mut self) -> Result<Token> {
        self.skip_whitespace();
        if self.is_at_end() {
            return Ok(Token::Eof);
        }
        self.next_token()
    }

    /// The input not consumed yet, as written.
    pub fn remainder(&self) -> String {
        self.input[self.position..].iter().collect()
    }

    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        match ch {
            '=' => {
                self.advance();
                // `==` reads as `=`
                self.consume_if('=');
                Ok(Token::Equal)
            }
            '!' => {
                self.advance();
                if self.consume_if('=') {
                    Ok(Token::NotEqual)
                } else {
                    Err(Error::Syntax("expected '=' after '!'".into()))
                }
            }
            '<' => {
                self.advance();
                if self.consume_if('=') {
                    Ok(Token::LowerEqual)
                } else if self.consume_if('>') {
                    Ok(Token::NotEqual)
                } else {
                    Ok(Token::Lower)
                }
            }
            '>' => {
                self.advance();
                if self.consume_if('=') {
                    Ok(Token::GreaterEqual)
                } else {
                    Ok(Token::Greater)
                }
            }
            '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            c if c.is_ascii_digit() => self.read_number(),
            '\'' | '"' => self.read_string(ch),
            _ => Err(Error::Syntax(format!("character {ch:?} is not supported"))),
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

    fn consume_if(&mut self, expected: char) -> bool {
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

    /// Reads a word. `NULL`, `TRUE` and `FALSE` are matched case-insensitively.
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "NULL" => Token::Null,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            _ => Token::Ident(ident),
        }
    }

    /// Reads a numeric literal, with an optional leading minus sign and an
    /// optional fraction or exponent.
    fn read_number(&mut self) -> Result<Token> {
        let mut number = String::new();
        let mut is_float = false;

        if self.current_char() == '-' {
            number.push('-');
            self.advance();
        }

        while !self.is_at_end() {
            let c = self.current_char();
            let exponent_sign =
                (c == '-' || c == '+') && number.ends_with(['e', 'E']);
            if c.is_ascii_digit() || exponent_sign {
                number.push(c);
            } else if c == '.' || c == 'e' || c == 'E' {
                is_float = true;
                number.push(c);
            } else {
                break;
            }
            self.advance();
        }

        if is_float {
            return number
                .parse::<f64>()
                .map(Token::FloatNumber)
                .map_err(|e| Error::Syntax(format!("bad number {number:?}: {e}")));
        }

        number
            .parse::<i64>()
            .map(Token::Number)
            .map_err(|e| Error::Syntax(format!("bad number {number:?}: {e}")))
    }

    /// Reads a quoted literal. A doubled quote inside stands for one quote.
    fn read_string(&mut self, quote: char) -> Result<Token> {
        self.advance(); // Skip the opening quote

        let mut string = String::new();
        loop {
            if self.is_at_end() {
                return Err(Error::Syntax("unterminated string".into()));
            }
            let c = self.current_char();
            self.advance();
            if c == quote {
                if self.consume_if(quote) {
                    string.push(quote);
                    continue;
                }
                break;
            }
            string.push(c);
        }

        Ok(Token::String(string))
    }
}
