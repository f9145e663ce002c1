//! `SQLite` result codes.
//!
//! The engine reports results as a flat integer space: the low byte is the
//! primary code and the upper bits select an extended subcategory (for
//! example `SQLITE_CONSTRAINT_UNIQUE = SQLITE_CONSTRAINT | 8 << 8`). Extended
//! codes are enabled on every connection, so errors carry the most precise
//! code the engine knows; [`ResultCode::to_primary`] collapses it back when a
//! caller only cares about the category.

use std::fmt;

macro_rules! result_codes {
    ($( $(#[$meta:meta])* $variant:ident = $value:literal => $name:literal, )*) => {
        /// A primary or extended `SQLite` result code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum ResultCode {
            $( $(#[$meta])* $variant = $value, )*
        }

        impl ResultCode {
            /// Maps a raw engine code onto a known variant.
            #[must_use]
            pub const fn from_raw(code: i32) -> Option<Self> {
                match code {
                    $( $value => Some(Self::$variant), )*
                    _ => None,
                }
            }

            /// The engine's symbolic name, e.g. `SQLITE_BUSY_SNAPSHOT`.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }
        }
    };
}

result_codes! {
    /// Successful result.
    Ok = 0 => "SQLITE_OK",
    /// Generic error.
    Error = 1 => "SQLITE_ERROR",
    /// Internal logic error in the engine.
    Internal = 2 => "SQLITE_INTERNAL",
    /// Access permission denied.
    Perm = 3 => "SQLITE_PERM",
    /// A callback requested an abort.
    Abort = 4 => "SQLITE_ABORT",
    /// The database file is locked by another connection.
    Busy = 5 => "SQLITE_BUSY",
    /// A table is locked within this connection.
    Locked = 6 => "SQLITE_LOCKED",
    /// A memory allocation failed.
    NoMem = 7 => "SQLITE_NOMEM",
    /// Attempt to write a read-only database.
    ReadOnly = 8 => "SQLITE_READONLY",
    /// The operation was interrupted.
    Interrupt = 9 => "SQLITE_INTERRUPT",
    /// A disk I/O error occurred.
    IoErr = 10 => "SQLITE_IOERR",
    /// The database image is malformed.
    Corrupt = 11 => "SQLITE_CORRUPT",
    /// Unknown opcode in a file control.
    NotFound = 12 => "SQLITE_NOTFOUND",
    /// The database is full.
    Full = 13 => "SQLITE_FULL",
    /// Unable to open the database file.
    CantOpen = 14 => "SQLITE_CANTOPEN",
    /// Locking protocol error.
    Protocol = 15 => "SQLITE_PROTOCOL",
    /// Internal use only.
    Empty = 16 => "SQLITE_EMPTY",
    /// The schema changed.
    Schema = 17 => "SQLITE_SCHEMA",
    /// A string or blob exceeds a size limit.
    TooBig = 18 => "SQLITE_TOOBIG",
    /// A constraint was violated.
    Constraint = 19 => "SQLITE_CONSTRAINT",
    /// Datatype mismatch.
    Mismatch = 20 => "SQLITE_MISMATCH",
    /// The library was used incorrectly.
    Misuse = 21 => "SQLITE_MISUSE",
    /// Large file support is unavailable.
    NoLfs = 22 => "SQLITE_NOLFS",
    /// Authorization denied.
    Auth = 23 => "SQLITE_AUTH",
    /// Not used.
    Format = 24 => "SQLITE_FORMAT",
    /// Parameter or column index out of range.
    Range = 25 => "SQLITE_RANGE",
    /// The file is not a database.
    NotADb = 26 => "SQLITE_NOTADB",
    /// Notification from the engine log.
    Notice = 27 => "SQLITE_NOTICE",
    /// Warning from the engine log.
    Warning = 28 => "SQLITE_WARNING",
    /// `sqlite3_step` produced a row.
    Row = 100 => "SQLITE_ROW",
    /// `sqlite3_step` finished executing.
    Done = 101 => "SQLITE_DONE",

    /// Extension loaded permanently.
    OkLoadPermanently = 256 => "SQLITE_OK_LOAD_PERMANENTLY",
    /// Symlink resolved during open.
    OkSymlink = 512 => "SQLITE_OK_SYMLINK",

    /// Missing collating sequence.
    ErrorMissingCollSeq = 257 => "SQLITE_ERROR_MISSING_COLLSEQ",
    /// Retry the prepare.
    ErrorRetry = 513 => "SQLITE_ERROR_RETRY",
    /// Historical snapshot unavailable.
    ErrorSnapshot = 769 => "SQLITE_ERROR_SNAPSHOT",

    /// Read I/O error.
    IoErrRead = 266 => "SQLITE_IOERR_READ",
    /// Short read.
    IoErrShortRead = 522 => "SQLITE_IOERR_SHORT_READ",
    /// Write I/O error.
    IoErrWrite = 778 => "SQLITE_IOERR_WRITE",
    /// fsync failed.
    IoErrFsync = 1034 => "SQLITE_IOERR_FSYNC",
    /// Directory fsync failed.
    IoErrDirFsync = 1290 => "SQLITE_IOERR_DIR_FSYNC",
    /// Truncate failed.
    IoErrTruncate = 1546 => "SQLITE_IOERR_TRUNCATE",
    /// fstat failed.
    IoErrFstat = 1802 => "SQLITE_IOERR_FSTAT",
    /// Unlock failed.
    IoErrUnlock = 2058 => "SQLITE_IOERR_UNLOCK",
    /// Read lock failed.
    IoErrRdLock = 2314 => "SQLITE_IOERR_RDLOCK",
    /// Delete failed.
    IoErrDelete = 2570 => "SQLITE_IOERR_DELETE",
    /// Out of memory inside the VFS.
    IoErrNoMem = 3082 => "SQLITE_IOERR_NOMEM",
    /// Access check failed.
    IoErrAccess = 3338 => "SQLITE_IOERR_ACCESS",
    /// Reserved-lock check failed.
    IoErrCheckReservedLock = 3594 => "SQLITE_IOERR_CHECKRESERVEDLOCK",
    /// Lock failed.
    IoErrLock = 3850 => "SQLITE_IOERR_LOCK",
    /// Close failed.
    IoErrClose = 4106 => "SQLITE_IOERR_CLOSE",
    /// Shared-memory open failed.
    IoErrShmOpen = 4618 => "SQLITE_IOERR_SHMOPEN",
    /// Shared-memory resize failed.
    IoErrShmSize = 4874 => "SQLITE_IOERR_SHMSIZE",
    /// Shared-memory lock failed.
    IoErrShmLock = 5130 => "SQLITE_IOERR_SHMLOCK",
    /// Shared-memory map failed.
    IoErrShmMap = 5386 => "SQLITE_IOERR_SHMMAP",
    /// Seek failed.
    IoErrSeek = 5642 => "SQLITE_IOERR_SEEK",
    /// File to delete does not exist.
    IoErrDeleteNoEnt = 5898 => "SQLITE_IOERR_DELETE_NOENT",
    /// Memory map failed.
    IoErrMmap = 6154 => "SQLITE_IOERR_MMAP",
    /// Temporary path unavailable.
    IoErrGetTempPath = 6410 => "SQLITE_IOERR_GETTEMPPATH",
    /// Path conversion failed.
    IoErrConvPath = 6666 => "SQLITE_IOERR_CONVPATH",
    /// Atomic write begin failed.
    IoErrBeginAtomic = 7434 => "SQLITE_IOERR_BEGIN_ATOMIC",
    /// Atomic write commit failed.
    IoErrCommitAtomic = 7690 => "SQLITE_IOERR_COMMIT_ATOMIC",
    /// Atomic write rollback failed.
    IoErrRollbackAtomic = 7946 => "SQLITE_IOERR_ROLLBACK_ATOMIC",
    /// Checksum mismatch.
    IoErrData = 8202 => "SQLITE_IOERR_DATA",
    /// Filesystem corruption detected.
    IoErrCorruptFs = 8458 => "SQLITE_IOERR_CORRUPTFS",

    /// Shared-cache table lock conflict.
    LockedSharedCache = 262 => "SQLITE_LOCKED_SHAREDCACHE",
    /// Virtual table lock conflict.
    LockedVtab = 518 => "SQLITE_LOCKED_VTAB",

    /// WAL recovery in progress.
    BusyRecovery = 261 => "SQLITE_BUSY_RECOVERY",
    /// The read snapshot is stale.
    BusySnapshot = 517 => "SQLITE_BUSY_SNAPSHOT",
    /// Blocking lock timed out.
    BusyTimeout = 773 => "SQLITE_BUSY_TIMEOUT",

    /// No temporary directory.
    CantOpenNoTempDir = 270 => "SQLITE_CANTOPEN_NOTEMPDIR",
    /// The path is a directory.
    CantOpenIsDir = 526 => "SQLITE_CANTOPEN_ISDIR",
    /// Full path unavailable.
    CantOpenFullPath = 782 => "SQLITE_CANTOPEN_FULLPATH",
    /// Path conversion failed.
    CantOpenConvPath = 1038 => "SQLITE_CANTOPEN_CONVPATH",
    /// The path is a symlink and symlinks are refused.
    CantOpenSymlink = 1550 => "SQLITE_CANTOPEN_SYMLINK",

    /// Virtual table corruption.
    CorruptVtab = 267 => "SQLITE_CORRUPT_VTAB",
    /// `sqlite_sequence` corruption.
    CorruptSequence = 523 => "SQLITE_CORRUPT_SEQUENCE",
    /// Index corruption.
    CorruptIndex = 779 => "SQLITE_CORRUPT_INDEX",

    /// Read-only while recovering WAL.
    ReadOnlyRecovery = 264 => "SQLITE_READONLY_RECOVERY",
    /// Shared memory cannot be locked.
    ReadOnlyCantLock = 520 => "SQLITE_READONLY_CANTLOCK",
    /// A hot journal needs rollback.
    ReadOnlyRollback = 776 => "SQLITE_READONLY_ROLLBACK",
    /// The database file was moved.
    ReadOnlyDbMoved = 1032 => "SQLITE_READONLY_DBMOVED",
    /// Shared memory cannot be initialized.
    ReadOnlyCantInit = 1288 => "SQLITE_READONLY_CANTINIT",
    /// The directory is read-only.
    ReadOnlyDirectory = 1544 => "SQLITE_READONLY_DIRECTORY",

    /// Statement aborted by a rollback.
    AbortRollback = 516 => "SQLITE_ABORT_ROLLBACK",

    /// CHECK constraint failed.
    ConstraintCheck = 275 => "SQLITE_CONSTRAINT_CHECK",
    /// Commit hook requested rollback.
    ConstraintCommitHook = 531 => "SQLITE_CONSTRAINT_COMMITHOOK",
    /// FOREIGN KEY constraint failed.
    ConstraintForeignKey = 787 => "SQLITE_CONSTRAINT_FOREIGNKEY",
    /// Function raised a constraint error.
    ConstraintFunction = 1043 => "SQLITE_CONSTRAINT_FUNCTION",
    /// NOT NULL constraint failed.
    ConstraintNotNull = 1299 => "SQLITE_CONSTRAINT_NOTNULL",
    /// PRIMARY KEY constraint failed.
    ConstraintPrimaryKey = 1555 => "SQLITE_CONSTRAINT_PRIMARYKEY",
    /// RAISE in a trigger.
    ConstraintTrigger = 1811 => "SQLITE_CONSTRAINT_TRIGGER",
    /// UNIQUE constraint failed.
    ConstraintUnique = 2067 => "SQLITE_CONSTRAINT_UNIQUE",
    /// Virtual table constraint failed.
    ConstraintVtab = 2323 => "SQLITE_CONSTRAINT_VTAB",
    /// Rowid is not unique.
    ConstraintRowId = 2579 => "SQLITE_CONSTRAINT_ROWID",
    /// Row pinned by an UPDATE trigger.
    ConstraintPinned = 2835 => "SQLITE_CONSTRAINT_PINNED",
    /// STRICT table datatype mismatch.
    ConstraintDataType = 3091 => "SQLITE_CONSTRAINT_DATATYPE",

    /// WAL recovered on open.
    NoticeRecoverWal = 283 => "SQLITE_NOTICE_RECOVER_WAL",
    /// Hot journal rolled back on open.
    NoticeRecoverRollback = 539 => "SQLITE_NOTICE_RECOVER_ROLLBACK",

    /// Automatic index created.
    WarningAutoIndex = 284 => "SQLITE_WARNING_AUTOINDEX",

    /// User authentication failed.
    AuthUser = 279 => "SQLITE_AUTH_USER",
}

impl ResultCode {
    /// Maps a raw code, falling back to its primary category (and then to
    /// [`ResultCode::Error`]) when the extended value is not known.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match Self::from_raw(code) {
            Some(known) => known,
            None => match Self::from_raw(code & 0xff) {
                Some(primary) => primary,
                None => Self::Error,
            },
        }
    }

    /// The raw integer value.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self as i32
    }

    /// Collapses an extended code to its primary category.
    ///
    /// `SQLITE_BUSY_SNAPSHOT.to_primary() == SQLITE_BUSY`. Primary codes map
    /// to themselves.
    #[must_use]
    pub const fn to_primary(self) -> Self {
        Self::from_code(self.raw() & 0xff)
    }

    /// Whether this is already a primary code.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        self.raw() & !0xff == 0
    }

    /// `true` for `SQLITE_OK`, `SQLITE_ROW` and `SQLITE_DONE`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self.to_primary(), Self::Ok | Self::Row | Self::Done)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        code.raw()
    }
}
