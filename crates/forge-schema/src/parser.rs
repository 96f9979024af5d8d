//! Recursive-descent parser for the lesson declaration.
//!
//! The accepted shape is
//!
//! ```text
//! [export] const lesson: GeneratedLessonContent = <literal> [;]
//! ```
//!
//! where `<literal>` is an object, array, string, number, boolean or `null`
//! literal. Identifiers in value position, calls, operators and spreads are
//! all syntax errors: the result is pure data and nothing in it is evaluated.

use crate::diagnostic::Position;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::SyntaxError;

/// Maximum nesting of objects and arrays.
pub const MAX_DEPTH: usize = 64;

/// The binding name the declaration must use.
pub const BINDING_NAME: &str = "lesson";

/// The type annotation the declaration must carry.
pub const CONTRACT_TYPE: &str = "GeneratedLessonContent";

/// A literal value with the position where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Start of the literal.
    pub position: Position,
    /// The literal itself.
    pub value: Value,
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `{ ... }`, properties in source order.
    Object(Vec<Property>),
    /// `[ ... ]`
    Array(Vec<Node>),
    /// A string literal.
    String(String),
    /// A numeric literal.
    Number(f64),
    /// `true` or `false`.
    Bool(bool),
    /// `null`
    Null,
}

impl Value {
    /// Returns the TypeScript name of this value's type, used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Null => "null",
        }
    }
}

/// One `key: value` entry of an object literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name.
    pub key: String,
    /// Where the name starts.
    pub key_position: Position,
    /// The assigned value.
    pub value: Node,
}

/// Parses a full candidate and returns the initializer of the declaration.
pub fn parse_declaration(source: &str) -> Result<Node, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, index: 0 };
    parser.declaration()
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always terminates the stream with Eof, and advance never
        // moves past it.
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.index += 1;
        }
        token
    }

    fn unexpected(token: &Token, expected: &str) -> SyntaxError {
        SyntaxError::new(
            token.position,
            format!("Expected {expected}, found {}", token.kind),
        )
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, SyntaxError> {
        let token = self.advance();
        if &token.kind == kind {
            Ok(token)
        } else {
            Err(Self::unexpected(&token, expected))
        }
    }

    fn expect_ident(&mut self, name: &str) -> Result<Token, SyntaxError> {
        let token = self.advance();
        match &token.kind {
            TokenKind::Ident(found) if found == name => Ok(token),
            _ => Err(Self::unexpected(&token, &format!("'{name}'"))),
        }
    }

    fn declaration(&mut self) -> Result<Node, SyntaxError> {
        if matches!(&self.peek().kind, TokenKind::Ident(name) if name == "export") {
            self.advance();
        }
        self.expect_ident("const")?;
        self.expect_ident(BINDING_NAME)?;
        self.expect(&TokenKind::Colon, "':' and a type annotation")?;
        self.expect_ident(CONTRACT_TYPE)?;
        self.expect(&TokenKind::Equals, "'='")?;

        let value = self.value(0)?;

        if self.peek().kind == TokenKind::Semicolon {
            self.advance();
        }
        let trailing = self.advance();
        if trailing.kind != TokenKind::Eof {
            return Err(SyntaxError::new(
                trailing.position,
                format!(
                    "Unexpected {} after the lesson declaration; output only the declaration",
                    trailing.kind
                ),
            ));
        }
        Ok(value)
    }

    fn value(&mut self, depth: usize) -> Result<Node, SyntaxError> {
        let token = self.advance();
        let position = token.position;
        let value = match token.kind {
            TokenKind::LBrace => self.object(position, depth + 1)?,
            TokenKind::LBracket => self.array(position, depth + 1)?,
            TokenKind::Str(s) => Value::String(s),
            TokenKind::Number(n) => Value::Number(n),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "null" => Value::Null,
                _ => {
                    return Err(SyntaxError::new(
                        position,
                        format!(
                            "Identifier '{name}' is not a literal value; only literal data is allowed"
                        ),
                    ));
                }
            },
            other => {
                return Err(Self::unexpected(
                    &Token {
                        kind: other,
                        position,
                    },
                    "a value",
                ));
            }
        };
        Ok(Node { position, value })
    }

    fn check_depth(position: Position, depth: usize) -> Result<(), SyntaxError> {
        if depth > MAX_DEPTH {
            return Err(SyntaxError::new(
                position,
                format!("Nesting too deep (limit {MAX_DEPTH})"),
            ));
        }
        Ok(())
    }

    fn object(&mut self, open: Position, depth: usize) -> Result<Value, SyntaxError> {
        Self::check_depth(open, depth)?;
        let mut properties = Vec::new();
        loop {
            if self.peek().kind == TokenKind::RBrace {
                self.advance();
                return Ok(Value::Object(properties));
            }

            let key_token = self.advance();
            let key = match key_token.kind {
                TokenKind::Ident(name) => name,
                TokenKind::Str(name) => name,
                TokenKind::Number(n) => n.to_string(),
                ref other => {
                    return Err(SyntaxError::new(
                        key_token.position,
                        format!("Expected a property name or '}}', found {other}"),
                    ));
                }
            };
            self.expect(&TokenKind::Colon, "':'")?;
            let value = self.value(depth)?;
            properties.push(Property {
                key,
                key_position: key_token.position,
                value,
            });

            let separator = self.advance();
            match separator.kind {
                TokenKind::Comma => {}
                TokenKind::RBrace => return Ok(Value::Object(properties)),
                _ => return Err(Self::unexpected(&separator, "',' or '}'")),
            }
        }
    }

    fn array(&mut self, open: Position, depth: usize) -> Result<Value, SyntaxError> {
        Self::check_depth(open, depth)?;
        let mut items = Vec::new();
        loop {
            if self.peek().kind == TokenKind::RBracket {
                self.advance();
                return Ok(Value::Array(items));
            }

            items.push(self.value(depth)?);

            let separator = self.advance();
            match separator.kind {
                TokenKind::Comma => {}
                TokenKind::RBracket => return Ok(Value::Array(items)),
                _ => return Err(Self::unexpected(&separator, "',' or ']'")),
            }
        }
    }
}
