//! Error types for the execution helpers.

use sqlkit_db::DbError;
use thiserror::Error;

/// Result type for execution helpers.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors raised while running statements and scripts.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Errors coming from the database binding.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Scripts bind by name only.
    #[error("positional arguments are not supported for scripts")]
    PositionalArgs,

    /// A named argument was not declared by any statement of a script.
    #[error("unused named argument {0}")]
    UnusedArgument(String),

    /// A single-result query produced no row.
    #[error("query returned no rows")]
    NoRows,

    /// A single-result query produced more than one row.
    #[error("query returned more than one row")]
    ExtraRows,

    /// A single-result query produced other than one column.
    #[error("query returned {0} columns, want 1")]
    ColumnCount(usize),

    /// A row callback failed.
    #[error("row callback failed: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ExecError {
    /// The underlying database error, if any.
    #[must_use]
    pub const fn as_db(&self) -> Option<&DbError> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}
