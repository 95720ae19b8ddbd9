//! Engine-specific error types.

use thiserror::Error;

/// Errors that can occur while configuring parsers or compiling queries.
///
/// Note that the per-line parse path never errors: unparseable lines yield
/// `None` and are dropped by `parse_many`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A user-supplied regex pattern failed to compile.
    #[error("invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// An unknown type was named in a user-regex coercion map.
    #[error("unknown coercion '{0}' (expected int, float, bool, lower, or upper)")]
    UnknownCoercion(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
