//! Database error types for the safe `SQLite` wrapper.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::code::ResultCode;

/// The binding operation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Opening a connection.
    Open,
    /// Compiling SQL.
    Prepare,
    /// Stepping a statement.
    Step,
    /// Resetting a statement.
    Reset,
    /// Binding a parameter; reported by the next step.
    Bind,
    /// Finalizing a statement.
    Finalize,
    /// Closing a connection.
    Close,
    /// Serializing a schema.
    Serialize,
    /// Deserializing a schema.
    Deserialize,
    /// Opening or accessing a blob.
    Blob,
    /// Changing connection configuration.
    Config,
}

impl ErrorKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Prepare => "prepare",
            Self::Step => "step",
            Self::Reset => "reset",
            Self::Bind => "bind",
            Self::Finalize => "finalize",
            Self::Close => "close",
            Self::Serialize => "serialize",
            Self::Deserialize => "deserialize",
            Self::Blob => "blob",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 1-based line and column inside the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line number.
    pub line: usize,
    /// Column number, in bytes.
    pub column: usize,
}

impl Position {
    /// Locates byte `offset` within `sql`.
    #[must_use]
    pub fn locate(sql: &str, offset: usize) -> Self {
        let head = &sql.as_bytes()[..offset.min(sql.len())];
        let line = 1 + head.iter().filter(|&&b| b == b'\n').count();
        let line_start = head
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |nl| nl + 1);
        Self {
            line,
            column: head.len() - line_start + 1,
        }
    }

    #[allow(clippy::ref_option)]
    fn suffix(position: &Option<Self>) -> String {
        position.map_or_else(String::new, |p| format!(" at {}:{}", p.line, p.column))
    }
}

/// Error returned by database operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {code}: {message}{}", Position::suffix(.position))]
pub struct DbError {
    /// Which operation failed.
    pub kind: ErrorKind,
    /// Extended `SQLite` result code.
    pub code: ResultCode,
    /// Human-readable error message (from `sqlite3_errmsg` when available).
    pub message: String,
    /// Byte offset of a syntax error inside the SQL text.
    pub offset: Option<usize>,
    /// Line and column matching `offset`.
    pub position: Option<Position>,
}

impl DbError {
    /// Creates a new database error.
    pub(crate) fn new(kind: ErrorKind, code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            offset: None,
            position: None,
        }
    }

    /// Attaches the byte offset of a syntax error in `sql`.
    pub(crate) fn with_offset(mut self, sql: &str, offset: usize) -> Self {
        self.offset = Some(offset);
        self.position = Some(Position::locate(sql, offset));
        self
    }

    pub(crate) fn interrupted(kind: ErrorKind) -> Self {
        Self::new(kind, ResultCode::Interrupt, "interrupted")
    }

    /// The extended result code.
    #[must_use]
    pub const fn code(&self) -> ResultCode {
        self.code
    }

    /// The operation that failed.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Byte offset of a syntax error, when the engine reported one.
    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// Whether the primary code is `SQLITE_BUSY`.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self.code.to_primary(), ResultCode::Busy)
    }

    /// Whether the primary code is `SQLITE_INTERRUPT`.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self.code.to_primary(), ResultCode::Interrupt)
    }

    /// Whether the primary code is `SQLITE_CONSTRAINT`.
    #[must_use]
    pub const fn is_constraint(&self) -> bool {
        matches!(self.code.to_primary(), ResultCode::Constraint)
    }

    /// Recovers the [`DbError`] wrapped in an I/O error raised by a
    /// [`Blob`](crate::Blob).
    #[must_use]
    pub fn from_io(err: &io::Error) -> Option<&Self> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }
}

impl From<DbError> for io::Error {
    fn from(err: DbError) -> Self {
        Self::other(err)
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
