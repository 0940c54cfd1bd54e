//! Lexer
//!
//! Turns source text into tokens. `//` starts a comment that runs to the
//! end of the line. Identifiers follow Unicode `XID_Start`/`XID_Continue`.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::errors::LexError;
use crate::util::span::{Position, Span};

/// Token kind
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    KwLet,
    KwFn,
    KwIf,
    KwElse,
    KwWhile,
    KwReturn,
    KwTrue,
    KwFalse,
    KwNil,
    KwAnd,
    KwOr,
    KwNot,

    // Literals
    Identifier(String),
    Number(f64),
    Str(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    EqEq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Semicolon,

    Eof,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<TokenKind> {
        Some(match word {
            "let" => TokenKind::KwLet,
            "fn" => TokenKind::KwFn,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "while" => TokenKind::KwWhile,
            "return" => TokenKind::KwReturn,
            "true" => TokenKind::KwTrue,
            "false" => TokenKind::KwFalse,
            "nil" => TokenKind::KwNil,
            "and" => TokenKind::KwAnd,
            "or" => TokenKind::KwOr,
            "not" => TokenKind::KwNot,
            _ => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let text = match self {
            TokenKind::KwLet => "let",
            TokenKind::KwFn => "fn",
            TokenKind::KwIf => "if",
            TokenKind::KwElse => "else",
            TokenKind::KwWhile => "while",
            TokenKind::KwReturn => "return",
            TokenKind::KwTrue => "true",
            TokenKind::KwFalse => "false",
            TokenKind::KwNil => "nil",
            TokenKind::KwAnd => "and",
            TokenKind::KwOr => "or",
            TokenKind::KwNot => "not",
            TokenKind::Identifier(name) => return write!(f, "identifier '{}'", name),
            TokenKind::Number(n) => return write!(f, "number {}", n),
            TokenKind::Str(_) => "string",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::Neq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Semicolon => ";",
            TokenKind::Eof => "end of file",
        };
        write!(f, "'{}'", text)
    }
}

/// Token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Main lexer structure
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    offset: usize,
    line: usize,
    column: usize,
    start: Position,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            offset: 0,
            line: 1,
            column: 1,
            start: Position::with_offset(1, 1, 0),
        }
    }

    /// Get current position
    pub fn position(&self) -> Position {
        Position::with_offset(self.line, self.column, self.offset)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.clone().nth(1)
    }

    fn eat(
        &mut self,
        expected: char,
    ) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_token(
        &self,
        kind: TokenKind,
    ) -> Token {
        Token {
            kind,
            span: Span::new(self.start, self.position()),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Generate next token. Returns an `Eof` token at the end of input.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();
        self.start = self.position();

        let Some(c) = self.advance() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        let kind = match c {
            c if unicode_ident::is_xid_start(c) || c == '_' => self.scan_identifier(c),
            c if c.is_ascii_digit() => self.scan_number(c)?,
            '"' => self.scan_string()?,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            '=' if self.eat('=') => TokenKind::EqEq,
            '=' => TokenKind::Eq,
            '!' if self.eat('=') => TokenKind::Neq,
            '<' if self.eat('=') => TokenKind::Le,
            '<' => TokenKind::Lt,
            '>' if self.eat('=') => TokenKind::Ge,
            '>' => TokenKind::Gt,
            ch => {
                return Err(LexError::UnexpectedChar {
                    ch,
                    position: self.start,
                })
            }
        };
        Ok(self.make_token(kind))
    }

    fn scan_identifier(
        &mut self,
        first_char: char,
    ) -> TokenKind {
        let mut value = String::new();
        value.push(first_char);
        while let Some(c) = self.peek() {
            if !unicode_ident::is_xid_continue(c) {
                break;
            }
            value.push(c);
            self.advance();
        }
        TokenKind::keyword(&value).unwrap_or(TokenKind::Identifier(value))
    }

    fn scan_number(
        &mut self,
        first_char: char,
    ) -> Result<TokenKind, LexError> {
        let mut text = String::new();
        text.push(first_char);
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        // A dot only belongs to the number when a digit follows it.
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        // Trailing identifier characters make the literal malformed, e.g. `12ab`.
        while let Some(c) = self.peek() {
            if !unicode_ident::is_xid_continue(c) {
                break;
            }
            text.push(c);
            self.advance();
        }

        text.replace('_', "")
            .parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| LexError::InvalidNumber {
                text,
                position: self.start,
            })
    }

    fn scan_string(&mut self) -> Result<TokenKind, LexError> {
        let mut value = String::new();
        loop {
            let position = self.position();
            match self.advance() {
                None | Some('\n') => {
                    return Err(LexError::UnterminatedString {
                        position: self.start,
                    })
                }
                Some('"') => return Ok(TokenKind::Str(value)),
                Some('\\') => {
                    let escaped = match self.advance() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(ch) => return Err(LexError::InvalidEscape { ch, position }),
                        None => {
                            return Err(LexError::UnterminatedString {
                                position: self.start,
                            })
                        }
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
    }
}

/// Tokenize source code. The result always ends with an `Eof` token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tracing::trace!(tokens = tokens.len(), "tokenized");
    Ok(tokens)
}
