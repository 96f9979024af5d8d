//! Tokenizer for the declaration subset accepted from the model.
//!
//! Only the tokens needed for `const lesson: T = { ... };` and plain object
//! and array literals exist. Anything else (operators, parentheses, spread,
//! template interpolation) is reported as a [`SyntaxError`] at the offending
//! character.

use crate::diagnostic::Position;
use crate::SyntaxError;

/// A lexical token kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// An identifier or keyword.
    Ident(String),
    /// A string literal with escapes already resolved.
    Str(String),
    /// A numeric literal.
    Number(f64),
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `=`
    Equals,
    /// End of input.
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Str(_) => write!(f, "string literal"),
            Self::Number(_) => write!(f, "number"),
            Self::LBrace => write!(f, "'{{'"),
            Self::RBrace => write!(f, "'}}'"),
            Self::LBracket => write!(f, "'['"),
            Self::RBracket => write!(f, "']'"),
            Self::Colon => write!(f, "':'"),
            Self::Comma => write!(f, "','"),
            Self::Semicolon => write!(f, "';'"),
            Self::Equals => write!(f, "'='"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// A token and where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was read.
    pub kind: TokenKind,
    /// Start of the token.
    pub position: Position,
}

/// Converts a candidate into a token stream terminated by [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
        }
    }

    const fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() || c == '\u{feff}' => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.position();
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => {
                                return Err(SyntaxError::new(start, "Unterminated block comment"));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_trivia()?;
        let position = self.position();
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                position,
            });
        };

        let kind = match c {
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            ':' => self.single(TokenKind::Colon),
            ',' => self.single(TokenKind::Comma),
            ';' => self.single(TokenKind::Semicolon),
            '=' => self.single(TokenKind::Equals),
            '"' | '\'' | '`' => TokenKind::Str(self.string(c)?),
            '-' | '.' | '0'..='9' => TokenKind::Number(self.number()?),
            c if is_ident_start(c) => TokenKind::Ident(self.ident()),
            other => {
                return Err(SyntaxError::new(
                    position,
                    format!("Unexpected character '{}'", other.escape_debug()),
                ));
            }
        };

        Ok(Token { kind, position })
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn ident(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if !is_ident_continue(c) {
                break;
            }
            name.push(c);
            self.bump();
        }
        name
    }

    fn number(&mut self) -> Result<f64, SyntaxError> {
        let start = self.position();
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push('-');
            self.bump();
        }
        let mut seen_digit = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => seen_digit = true,
                '.' | '_' => {}
                'e' | 'E' => {
                    text.push(c);
                    self.bump();
                    if let Some(sign @ ('+' | '-')) = self.peek() {
                        text.push(sign);
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            if c != '_' {
                text.push(c);
            }
            self.bump();
        }

        if !seen_digit {
            return Err(SyntaxError::new(
                start,
                format!("Invalid numeric literal '{text}'"),
            ));
        }
        if let Some(c) = self.peek() {
            if is_ident_start(c) {
                return Err(SyntaxError::new(
                    self.position(),
                    "An identifier or keyword cannot immediately follow a numeric literal",
                ));
            }
        }

        text.parse::<f64>()
            .map_err(|_| SyntaxError::new(start, format!("Invalid numeric literal '{text}'")))
    }

    fn string(&mut self, quote: char) -> Result<String, SyntaxError> {
        let start = self.position();
        self.bump();
        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::new(start, "Unterminated string literal"));
            };
            match c {
                c if c == quote => {
                    self.bump();
                    return Ok(value);
                }
                '\n' if quote != '`' => {
                    return Err(SyntaxError::new(start, "Unterminated string literal"));
                }
                '$' if quote == '`' && self.peek_at(1) == Some('{') => {
                    return Err(SyntaxError::new(
                        self.position(),
                        "Template literal interpolation is not allowed in lesson content",
                    ));
                }
                '\\' => {
                    self.bump();
                    if let Some(resolved) = self.escape()? {
                        value.push(resolved);
                    }
                }
                _ => {
                    value.push(c);
                    self.bump();
                }
            }
        }
    }

    /// Reads the escape sequence after a backslash. Returns `None` for a
    /// line continuation.
    fn escape(&mut self) -> Result<Option<char>, SyntaxError> {
        let position = self.position();
        let Some(c) = self.bump() else {
            return Err(SyntaxError::new(position, "Unterminated string literal"));
        };
        let resolved = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' => '\0',
            '\n' => return Ok(None),
            'x' => {
                let code = self.hex_digits(2, position)?;
                char_from(code, position)?
            }
            'u' => self.unicode_escape(position)?,
            other => other,
        };
        Ok(Some(resolved))
    }

    fn unicode_escape(&mut self, position: Position) -> Result<char, SyntaxError> {
        if self.peek() == Some('{') {
            self.bump();
            let mut code: u32 = 0;
            let mut digits = 0;
            while let Some(c) = self.peek() {
                if c == '}' {
                    break;
                }
                let digit = c
                    .to_digit(16)
                    .ok_or_else(|| SyntaxError::new(position, "Invalid Unicode escape sequence"))?;
                code = code.saturating_mul(16).saturating_add(digit);
                digits += 1;
                self.bump();
            }
            if self.bump() != Some('}') || digits == 0 {
                return Err(SyntaxError::new(position, "Invalid Unicode escape sequence"));
            }
            return char_from(code, position);
        }

        let high = self.hex_digits(4, position)?;
        if (0xD800..0xDC00).contains(&high)
            && self.peek() == Some('\\')
            && self.peek_at(1) == Some('u')
        {
            self.bump();
            self.bump();
            let low = self.hex_digits(4, position)?;
            if (0xDC00..0xE000).contains(&low) {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return char_from(combined, position);
            }
        }
        char_from(high, position)
    }

    fn hex_digits(&mut self, count: usize, position: Position) -> Result<u32, SyntaxError> {
        let mut code: u32 = 0;
        for _ in 0..count {
            let digit = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| SyntaxError::new(position, "Invalid hexadecimal escape sequence"))?;
            code = code * 16 + digit;
            self.bump();
        }
        Ok(code)
    }
}

fn char_from(code: u32, position: Position) -> Result<char, SyntaxError> {
    char::from_u32(code).ok_or_else(|| {
        SyntaxError::new(
            position,
            format!("Escape sequence U+{code:04X} is not a valid character"),
        )
    })
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
