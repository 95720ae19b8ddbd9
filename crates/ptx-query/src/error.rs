use std::fmt;

use thiserror::Error;

/// Source location within a query string.
///
/// Attached to syntax errors when position information is available from
/// pest parse failures. Line and column are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Errors that can occur while parsing a query or transform string.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{}", format_with_location(.0, .1))]
    Syntax(String, Option<SourceLocation>),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("wrong number of arguments for '{func}': expected {expected}, got {got}")]
    WrongArity {
        func: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),
}

impl QueryError {
    /// Returns the source location if this error variant carries one.
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            QueryError::Syntax(_, loc) => *loc,
            _ => None,
        }
    }
}

fn format_with_location(msg: &str, loc: &Option<SourceLocation>) -> String {
    match loc {
        Some(loc) => format!("query syntax error at {loc}: {msg}"),
        None => format!("query syntax error: {msg}"),
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
