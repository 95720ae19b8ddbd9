//! CLI error kinds and their exit codes.
//!
//! Exit codes: 0 success, 1 user error, 2 internal error. Messages go to
//! stderr; only `main` turns an error into an exit code.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Query or transform string failed to parse.
    #[error("{0}")]
    Query(#[from] ptx_query::QueryError),

    /// `--format` named a parser that is not registered.
    #[error("unknown format '{0}' (see `ptx formats`)")]
    UnknownFormat(String),

    /// Auto-detection found no parser for a non-empty input.
    #[error("could not detect a log format for '{0}'")]
    NoFormatDetected(String),

    /// A required argument was missing or empty.
    #[error("missing argument: {0}")]
    MissingArgument(String),

    /// Reading an input source failed.
    #[error("cannot read {path}: {source}")]
    SourceFetch {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The `find` pattern failed to compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The config file named by PTX_CONFIG was unreadable or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// Parser construction failed (bad regex-format config).
    #[error("{0}")]
    Engine(#[from] ptx_engine::EngineError),

    /// Programmer error; should never surface in normal use.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Internal(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
