//! Front-end errors
//!
//! Everything that can go wrong before a chunk runs. Runtime failures are
//! [`ScriptError`](crate::runtime::engine::ScriptError)s instead.

use thiserror::Error;

use crate::util::span::Position;

/// Lexer error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("{position}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, position: Position },

    #[error("{position}: unterminated string")]
    UnterminatedString { position: Position },

    #[error("{position}: invalid escape sequence '\\{ch}'")]
    InvalidEscape { ch: char, position: Position },

    #[error("{position}: invalid number literal '{text}'")]
    InvalidNumber { text: String, position: Position },
}

impl LexError {
    /// Where the offending token starts.
    pub fn position(&self) -> Position {
        match self {
            LexError::UnexpectedChar { position, .. }
            | LexError::UnterminatedString { position }
            | LexError::InvalidEscape { position, .. }
            | LexError::InvalidNumber { position, .. } => *position,
        }
    }
}

/// Parser error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{position}: {message}")]
pub struct ParseError {
    pub position: Position,
    pub message: String,
}

impl ParseError {
    pub fn new(
        position: Position,
        message: impl Into<String>,
    ) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Failure to turn source text into a runnable chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{chunk}:{error}")]
    Lex { chunk: String, error: LexError },

    #[error("{chunk}:{error}")]
    Parse { chunk: String, error: ParseError },

    #[error("{chunk}:{line}: {message}")]
    Codegen {
        chunk: String,
        line: usize,
        message: String,
    },
}

impl CompileError {
    /// Source line the error points at.
    pub fn line(&self) -> usize {
        match self {
            CompileError::Lex { error, .. } => error.position().line,
            CompileError::Parse { error, .. } => error.position.line,
            CompileError::Codegen { line, .. } => *line,
        }
    }

    /// Line and column, when the error was found before code generation.
    pub fn position(&self) -> Option<Position> {
        match self {
            CompileError::Lex { error, .. } => Some(error.position()),
            CompileError::Parse { error, .. } => Some(error.position),
            CompileError::Codegen { .. } => None,
        }
    }
}
