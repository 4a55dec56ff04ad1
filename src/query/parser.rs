//! Tokenizer and recursive-descent parser for query expressions

use serde_yaml::{Number, Value};

use super::QueryError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    Field(String),
    Index(i64),
    Iterate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Path(Vec<Step>),
    Literal(Value),
    Pipe(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CmpOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Select(Box<Expr>),
    Not,
    Length,
    Keys,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Dot,
    Ident(String),
    Str(String),
    Num(Number),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Pipe,
    Op(CmpOp),
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Dot => "'.'".to_string(),
            Token::Ident(name) => format!("'{}'", name),
            Token::Str(s) => format!("string {:?}", s),
            Token::Num(n) => format!("number {}", n),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Pipe => "'|'".to_string(),
            Token::Op(_) => "operator".to_string(),
            Token::Eof => "end of query".to_string(),
        }
    }
}

fn syntax(position: usize, message: impl Into<String>) -> QueryError {
    QueryError::Syntax {
        position,
        message: message.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '.' => {
                chars.next();
                Token::Dot
            }
            '[' => {
                chars.next();
                Token::LBracket
            }
            ']' => {
                chars.next();
                Token::RBracket
            }
            '(' => {
                chars.next();
                Token::LParen
            }
            ')' => {
                chars.next();
                Token::RParen
            }
            '|' => {
                chars.next();
                Token::Pipe
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let followed_by_eq = matches!(chars.peek(), Some(&(_, '=')));
                if followed_by_eq {
                    chars.next();
                }
                let op = match (c, followed_by_eq) {
                    ('=', true) => CmpOp::Eq,
                    ('!', true) => CmpOp::Ne,
                    ('<', false) => CmpOp::Lt,
                    ('<', true) => CmpOp::Le,
                    ('>', false) => CmpOp::Gt,
                    ('>', true) => CmpOp::Ge,
                    _ => return Err(syntax(pos, format!("unexpected '{}'", c))),
                };
                Token::Op(op)
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((esc_pos, '\\')) => match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, 'r')) => s.push('\r'),
                            Some((_, '"')) => s.push('"'),
                            Some((_, '\\')) => s.push('\\'),
                            _ => return Err(syntax(esc_pos, "invalid escape in string")),
                        },
                        Some((_, c)) => s.push(c),
                        None => return Err(syntax(pos, "unterminated string")),
                    }
                }
                Token::Str(s)
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut text = String::new();
                text.push(c);
                chars.next();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '.' || c == '+' || c == '-' {
                        text.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Num(parse_number(&text).ok_or_else(|| {
                    syntax(pos, format!("invalid number '{}'", text))
                })?)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '-' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(name)
            }
            c => return Err(syntax(pos, format!("unexpected '{}'", c))),
        };
        tokens.push((token, pos));
    }

    tokens.push((Token::Eof, source.len()));
    Ok(tokens)
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(n) = text.parse::<i64>() {
        return Some(Number::from(n));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Number::from)
}

/// Parses a full query expression.
pub(crate) fn parse(source: &str) -> Result<Expr, QueryError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
    };
    let expr = parser.pipeline()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].0
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].1
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].0.clone();
        if token != Token::Eof {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> QueryError {
        syntax(
            self.position(),
            format!("expected {}, found {}", expected, self.peek().describe()),
        )
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), QueryError> {
        if *self.peek() == token {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_end(&self) -> Result<(), QueryError> {
        match self.peek() {
            Token::Eof => Ok(()),
            _ => Err(self.unexpected("end of query")),
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Token::Ident(name) if name == keyword)
    }

    fn pipeline(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.alternative()?;
        while *self.peek() == Token::Pipe {
            self.advance();
            let right = self.alternative()?;
            left = Expr::Pipe(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn alternative(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.conjunct()?;
        while self.at_keyword("or") {
            self.advance();
            let right = self.conjunct()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn conjunct(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.comparison()?;
        while self.at_keyword("and") {
            self.advance();
            let right = self.comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, QueryError> {
        let left = self.term()?;
        if let Token::Op(op) = *self.peek() {
            self.advance();
            let right = self.term()?;
            return Ok(Expr::Compare(Box::new(left), op, Box::new(right)));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, QueryError> {
        let position = self.position();
        match self.advance() {
            Token::Dot => self.path(),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Num(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::LParen => {
                let inner = self.pipeline()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "not" => Ok(Expr::Not),
                "length" => Ok(Expr::Length),
                "keys" => Ok(Expr::Keys),
                "select" => {
                    self.expect(Token::LParen, "'(' after select")?;
                    let cond = self.pipeline()?;
                    self.expect(Token::RParen, "')'")?;
                    Ok(Expr::Select(Box::new(cond)))
                }
                _ => Err(syntax(position, format!("unknown function '{}'", name))),
            },
            Token::Eof => Err(syntax(position, "unexpected end of query")),
            other => Err(syntax(
                position,
                format!("expected an expression, found {}", other.describe()),
            )),
        }
    }

    /// Parses the remainder of a path whose leading `.` was consumed.
    fn path(&mut self) -> Result<Expr, QueryError> {
        let mut steps = Vec::new();

        match self.peek() {
            Token::Ident(_) | Token::Str(_) => steps.push(self.key()?),
            Token::LBracket => steps.push(self.bracket()?),
            _ => return Ok(Expr::Path(steps)),
        }

        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    match self.peek() {
                        Token::Ident(_) | Token::Str(_) => steps.push(self.key()?),
                        Token::LBracket => steps.push(self.bracket()?),
                        _ => return Err(self.unexpected("a key after '.'")),
                    }
                }
                Token::LBracket => steps.push(self.bracket()?),
                _ => break,
            }
        }

        Ok(Expr::Path(steps))
    }

    fn key(&mut self) -> Result<Step, QueryError> {
        match self.advance() {
            Token::Ident(name) | Token::Str(name) => Ok(Step::Field(name)),
            _ => Err(self.unexpected("a key")),
        }
    }

    fn bracket(&mut self) -> Result<Step, QueryError> {
        self.expect(Token::LBracket, "'['")?;
        let position = self.position();

        let step = match self.advance() {
            Token::RBracket => return Ok(Step::Iterate),
            Token::Str(key) => Step::Field(key),
            Token::Num(n) => match n.as_i64() {
                Some(index) => Step::Index(index),
                None => return Err(syntax(position, format!("index must be an integer, got {}", n))),
            },
            other => {
                return Err(syntax(
                    position,
                    format!("expected an index, found {}", other.describe()),
                ))
            }
        };

        self.expect(Token::RBracket, "']'")?;
        Ok(step)
    }
}
