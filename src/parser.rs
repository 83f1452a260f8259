use crate::ast::ConditionOp;
use crate::error::{Error, Result};
use crate::tokenizer::{Token, Tokenizer};
use crate::value::HostValue;

/// A parsed textual predicate: `field op value`, or a bare `field`
/// awaiting a keyword operator.
///
/// The value is everything after the operator. A single number, quoted
/// string, word, `NULL`, `TRUE` or `FALSE` keeps its literal type. Any
/// other text (`Titanic Returns`, `2024-01-01`, `a@b.com`) is taken as one
/// string, with a surrounding pair of quotes removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub comparison: Option<(ConditionOp, HostValue)>,
}

impl Predicate {
    /// Tokenizes and parses predicate text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokenizer = Tokenizer::new(text);
        let head = vec![tokenizer.scan()?, tokenizer.scan()?];
        Parser::new(head).parse(&tokenizer.remainder())
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parses `field` or `field op`, taking `rest` as the text after the
    /// operator.
    pub fn parse(&mut self, rest: &str) -> Result<Predicate> {
        let field = self.consume_ident()?;

        if self.is_at_end() {
            return Ok(Predicate {
                field,
                comparison: None,
            });
        }

        let op = self.consume_operator()?;
        let value = Self::consume_value(rest)?;

        Ok(Predicate {
            field,
            comparison: Some((op, value)),
        })
    }

    // helpers
    fn current_token(&self) -> &Token {
        // The token stream always ends with Eof.
        self.tokens
            .get(self.position)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn consume_ident(&mut self) -> Result<String> {
        match self.current_token() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(Error::Syntax(format!(
                "expected a field name, found {other:?}"
            ))),
        }
    }

    fn consume_operator(&mut self) -> Result<ConditionOp> {
        let op = match self.current_token() {
            Token::Equal => ConditionOp::Eq,
            Token::NotEqual => ConditionOp::Ne,
            Token::Lower => ConditionOp::Lt,
            Token::Greater => ConditionOp::Gt,
            Token::LowerEqual => ConditionOp::Le,
            Token::GreaterEqual => ConditionOp::Ge,
            other => {
                return Err(Error::Syntax(format!(
                    "expected a comparison operator, found {other:?}"
                )));
            }
        };
        self.advance();
        Ok(op)
    }

    /// Reads the right-hand side.
    fn consume_value(rest: &str) -> Result<HostValue> {
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(Error::Syntax("expected a value after the operator".into()));
        }

        match Tokenizer::new(rest).tokenize() {
            Ok(tokens) if tokens.len() == 2 => Self::literal(&tokens[0]),
            Ok(tokens) if tokens[0].is_operator() => Err(Error::Syntax(format!(
                "expected a value, found {:?}",
                tokens[0]
            ))),
            _ => Ok(HostValue::Str(unquote(rest).to_string())),
        }
    }

    fn literal(token: &Token) -> Result<HostValue> {
        Ok(match token {
            Token::Number(i) => HostValue::Int(*i),
            Token::FloatNumber(f) => HostValue::Float(*f),
            Token::String(s) | Token::Ident(s) => HostValue::Str(s.clone()),
            Token::Null => HostValue::Null,
            Token::True => HostValue::Bool(true),
            Token::False => HostValue::Bool(false),
            other => {
                return Err(Error::Syntax(format!(
                    "expected a value, found {other:?}"
                )));
            }
        })
    }
}

/// Strips one pair of matching single or double quotes.
fn unquote(text: &str) -> &str {
    ['\'', '"']
        .into_iter()
        .find_map(|q| {
            text.strip_prefix(q)
                .and_then(|inner| inner.strip_suffix(q))
        })
        .unwrap_or(text)
}
