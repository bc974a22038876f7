//! Parse error types.

use serde::{Deserialize, Serialize};
use std::fmt;
use weft_lexer::Token;

/// Parse error with source location and context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    /// Kind of parse error
    pub kind: ParseErrorKind,
    /// Human-readable error message
    pub message: String,
    /// 1-based line of the offending position
    pub line: u32,
    /// 1-based column of the offending position
    pub col: u32,
}

/// Category of parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseErrorKind {
    /// A specific token was expected but a different one was found.
    UnexpectedToken,

    /// The token stream ended while a construct was incomplete.
    UnexpectedEof,

    /// Tokens are present but violate the grammar structurally.
    InvalidSyntax,

    /// A fatal invariant breach: `as_value` on a value-less node, or a
    /// parenthesis on the left of an equality without a function or `if`
    /// on the right. Not recoverable by construction.
    Invariant,
}

impl ParseError {
    /// Create an "expected X, found Y" error.
    pub fn expected(what: &str, found: Option<&Token>, at: (u32, u32)) -> Self {
        let (message, kind) = match found {
            Some(token) => (
                format!("expected {}, found {:?} {:?}", what, token.kind, token.image),
                ParseErrorKind::UnexpectedToken,
            ),
            None => (
                format!("expected {}, found end of input", what),
                ParseErrorKind::UnexpectedEof,
            ),
        };
        Self {
            kind,
            message,
            line: at.0,
            col: at.1,
        }
    }

    /// Create an "unexpected token" error with context.
    pub fn unexpected(found: Option<&Token>, context: &str, at: (u32, u32)) -> Self {
        let (message, kind) = match found {
            Some(token) => (
                format!("unexpected {:?} {}", token.image, context),
                ParseErrorKind::UnexpectedToken,
            ),
            None => (
                format!("unexpected end of input {}", context),
                ParseErrorKind::UnexpectedEof,
            ),
        };
        Self {
            kind,
            message,
            line: at.0,
            col: at.1,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(message: impl Into<String>, at: (u32, u32)) -> Self {
        Self {
            kind: ParseErrorKind::InvalidSyntax,
            message: message.into(),
            line: at.0,
            col: at.1,
        }
    }

    /// Create a fatal invariant error.
    pub fn invariant(message: impl Into<String>, at: (u32, u32)) -> Self {
        Self {
            kind: ParseErrorKind::Invariant,
            message: message.into(),
            line: at.0,
            col: at.1,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.message, self.line, self.col)
    }
}

impl std::error::Error for ParseError {}
