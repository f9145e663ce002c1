//! Connection configuration: open flags, resource limits and open options.

use std::os::raw::c_int;
use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Flags accepted by [`Connection::open`](crate::Connection::open).
    ///
    /// All flags except [`OpenFlags::WAL`] map directly onto the engine's
    /// `SQLITE_OPEN_*` values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct OpenFlags: u32 {
        /// Open read-only.
        const READ_ONLY = 0x0000_0001;
        /// Open for reading and writing.
        const READ_WRITE = 0x0000_0002;
        /// Create the file if missing.
        const CREATE = 0x0000_0004;
        /// Interpret the path as a URI.
        const URI = 0x0000_0040;
        /// Open an in-memory database.
        const MEMORY = 0x0000_0080;
        /// Multi-thread mode: no per-connection mutex.
        const NO_MUTEX = 0x0000_8000;
        /// Serialized mode: per-connection mutex.
        const FULL_MUTEX = 0x0001_0000;
        /// Enable shared cache.
        const SHARED_CACHE = 0x0002_0000;
        /// Disable shared cache.
        const PRIVATE_CACHE = 0x0004_0000;
        /// Refuse to open symbolic links.
        const NO_FOLLOW = 0x0100_0000;
        /// Switch file databases to write-ahead logging after open.
        const WAL = 0x8000_0000;
    }
}

impl OpenFlags {
    /// Flags used when none are given.
    pub const DEFAULT: Self = Self::READ_WRITE
        .union(Self::CREATE)
        .union(Self::WAL)
        .union(Self::URI)
        .union(Self::NO_MUTEX);

    /// Bits passed to the engine, i.e. everything but [`OpenFlags::WAL`].
    #[allow(clippy::cast_possible_wrap)]
    pub(crate) const fn native(self) -> c_int {
        self.difference(Self::WAL).bits() as c_int
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-connection resource limit categories (`SQLITE_LIMIT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    /// Maximum size of any string, blob or row.
    Length,
    /// Maximum length of an SQL statement.
    SqlLength,
    /// Maximum columns in a table, index, view or result.
    Column,
    /// Maximum parse-tree depth of an expression.
    ExprDepth,
    /// Maximum terms in a compound SELECT.
    CompoundSelect,
    /// Maximum instructions in a compiled program.
    VdbeOp,
    /// Maximum arguments on a function.
    FunctionArg,
    /// Maximum attached databases.
    Attached,
    /// Maximum length of a LIKE or GLOB pattern.
    LikePatternLength,
    /// Maximum index of a host parameter.
    VariableNumber,
    /// Maximum trigger recursion depth.
    TriggerDepth,
    /// Maximum auxiliary worker threads for one statement.
    WorkerThreads,
}

impl Limit {
    pub(crate) const fn id(self) -> c_int {
        match self {
            Self::Length => 0,
            Self::SqlLength => 1,
            Self::Column => 2,
            Self::ExprDepth => 3,
            Self::CompoundSelect => 4,
            Self::VdbeOp => 5,
            Self::FunctionArg => 6,
            Self::Attached => 7,
            Self::LikePatternLength => 8,
            Self::VariableNumber => 9,
            Self::TriggerDepth => 10,
            Self::WorkerThreads => 11,
        }
    }
}

/// One limit applied by [`OpenOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSetting {
    /// The category.
    pub limit: Limit,
    /// The new value; the engine clamps it to its compile-time maximum.
    pub value: i32,
}

/// Options for [`Connection::open_with`](crate::Connection::open_with).
///
/// Every field has a default, so a host can deserialize a partial document:
///
/// ```
/// let opts: sqlkit_db::OpenOptions =
///     serde_json::from_str(r#"{ "busy_timeout_ms": 250 }"#).unwrap();
/// assert_eq!(opts.busy_timeout_ms, 250);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Open flags; empty means [`OpenFlags::DEFAULT`].
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds; zero fails fast on contention.
    pub busy_timeout_ms: u64,
    /// Enable `SQLITE_DBCONFIG_DEFENSIVE`.
    pub defensive: bool,
    /// Limits applied after open, in order.
    pub limits: Vec<LimitSetting>,
}

impl OpenOptions {
    /// The busy timeout as a [`Duration`].
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            flags: OpenFlags::DEFAULT,
            busy_timeout_ms: 10_000,
            defensive: false,
            limits: Vec::new(),
        }
    }
}
