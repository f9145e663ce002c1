//! Safe wrapper around a `SQLite` database connection.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawDb`] which encapsulates the raw pointers and C type conversions.

use std::cell::Cell;
use std::fmt;
use std::os::raw::c_int;
use std::time::Duration;

use crate::blob::Blob;
use crate::busy::BusyPolicy;
use crate::cache::{CachedStatement, StatementCache};
use crate::code::ResultCode;
use crate::config::{Limit, OpenFlags, OpenOptions};
use crate::error::{DbError, DbResult, ErrorKind};
use crate::ffi::{self, RawDb, RawStmt};
use crate::interrupt::InterruptSignal;
use crate::statement::Statement;

/// A `SQLite` database connection.
///
/// `Send` but not `Sync`: a connection may move between threads but is used
/// from one thread at a time. Statements and blobs borrow it, so they cannot
/// outlive it. Released when dropped; [`close`](Self::close) does the same
/// and reports failures.
pub struct Connection {
    // Declared before `db` so cached handles are finalized first.
    cache: StatementCache,
    db: RawDb,
    path: String,
    flags: OpenFlags,
    live_statements: Cell<usize>,
    live_blobs: Cell<usize>,
}

impl Connection {
    /// Opens (or creates) a database at `path`.
    ///
    /// Empty `flags` mean [`OpenFlags::DEFAULT`]. `":memory:"` opens a
    /// private in-memory database and `""` a private temporary one; neither
    /// switches to write-ahead logging.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Open`] error if the engine cannot open the
    /// database or the initial configuration fails.
    pub fn open(path: &str, flags: OpenFlags) -> DbResult<Self> {
        let flags = if flags.is_empty() {
            OpenFlags::DEFAULT
        } else {
            flags
        };
        let db = RawDb::open(path, flags.native()).map_err(|(rc, msg)| {
            DbError::new(
                ErrorKind::Open,
                ResultCode::from_code(rc),
                format!("{path:?}: {msg}"),
            )
        })?;
        let conn = Self {
            cache: StatementCache::default(),
            db,
            path: path.to_string(),
            flags,
            live_statements: Cell::new(0),
            live_blobs: Cell::new(0),
        };
        conn.configure()?;
        log::debug!("opened {path:?} with {flags:?}");
        Ok(conn)
    }

    /// Opens a private in-memory database with the default flags.
    ///
    /// # Errors
    ///
    /// As [`open`](Self::open).
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(":memory:", OpenFlags::empty())
    }

    /// Opens a database and applies `options` to it.
    ///
    /// # Errors
    ///
    /// As [`open`](Self::open), plus any failure applying the options.
    pub fn open_with(path: &str, options: &OpenOptions) -> DbResult<Self> {
        let conn = Self::open(path, options.flags)?;
        conn.set_busy_timeout(options.busy_timeout());
        if options.defensive {
            conn.set_defensive(true)?;
        }
        for setting in &options.limits {
            conn.set_limit(setting.limit, setting.value);
        }
        Ok(conn)
    }

    fn configure(&self) -> DbResult<()> {
        for op in [ffi::SQLITE_DBCONFIG_DQS_DML, ffi::SQLITE_DBCONFIG_DQS_DDL] {
            let rc = self.db.db_config_flag(op, false);
            if rc != ffi::SQLITE_OK {
                return Err(self.error(ErrorKind::Open, rc));
            }
        }
        if self.flags.contains(OpenFlags::WAL) && !self.is_memory() {
            let rc = self.db.exec("PRAGMA journal_mode=wal;");
            if rc != ffi::SQLITE_OK {
                return Err(self.error(ErrorKind::Open, rc));
            }
        }
        Ok(())
    }

    /// In-memory and temporary databases have no WAL mode.
    fn is_memory(&self) -> bool {
        self.path.is_empty()
            || self.path == ":memory:"
            || self.flags.contains(OpenFlags::MEMORY)
            || self.path.starts_with("file::memory:")
            || self.path.contains("mode=memory")
    }

    /// Closes the connection.
    ///
    /// Cached statements are finalized first. If a statement or blob is still
    /// live (one was leaked with [`std::mem::forget`]), the connection is
    /// handed back open together with a busy error.
    ///
    /// # Errors
    ///
    /// Returns the still-open connection and an [`ErrorKind::Close`] error.
    #[allow(clippy::result_large_err)]
    pub fn close(mut self) -> Result<(), (Self, DbError)> {
        self.cache.clear();
        let (stmts, blobs) = (self.live_statements.get(), self.live_blobs.get());
        if stmts > 0 || blobs > 0 {
            let err = DbError::new(
                ErrorKind::Close,
                ResultCode::Busy,
                format!("{stmts} statements and {blobs} blobs still open"),
            );
            return Err((self, err));
        }
        match self.db.close() {
            ffi::SQLITE_OK => {
                log::debug!("closed {:?}", self.path);
                Ok(())
            }
            rc => {
                let err = DbError::new(ErrorKind::Close, ResultCode::from_code(rc), ffi::errstr(rc));
                Err((self, err))
            }
        }
    }

    // ── Crate-internal plumbing ─────────────────────────────────────────

    pub(crate) const fn cache(&self) -> &StatementCache {
        &self.cache
    }

    pub(crate) const fn live_statements(&self) -> &Cell<usize> {
        &self.live_statements
    }

    pub(crate) const fn live_blobs(&self) -> &Cell<usize> {
        &self.live_blobs
    }

    /// Builds an error from `rc` and the connection's error state.
    pub(crate) fn error(&self, kind: ErrorKind, rc: c_int) -> DbError {
        let extended = self.db.extended_errcode();
        let code = if extended & 0xff == rc & 0xff {
            extended
        } else {
            rc
        };
        DbError::new(kind, ResultCode::from_code(code), self.db.errmsg())
    }

    pub(crate) fn check_interrupt(&self, kind: ErrorKind) -> DbResult<()> {
        if self.is_interrupted() {
            Err(DbError::interrupted(kind))
        } else {
            Ok(())
        }
    }

    // ── Preparing statements ────────────────────────────────────────────

    /// Compiles the head of `sql`, returning the handle (if `sql` held a
    /// statement) and the number of trailing bytes left over.
    fn compile(&self, sql: &str, persistent: bool) -> DbResult<(Option<RawStmt>, usize)> {
        self.check_interrupt(ErrorKind::Prepare)?;
        let (rc, raw, trailing) = self.db.prepare(sql, persistent);
        if rc != ffi::SQLITE_OK {
            let err = self.error(ErrorKind::Prepare, rc);
            return Err(match self.db.error_offset() {
                Some(offset) => err.with_offset(sql, offset),
                None => err,
            });
        }
        Ok((raw, trailing))
    }

    /// Compiles exactly one statement; trailing content is an error.
    fn compile_one(&self, sql: &str, persistent: bool) -> DbResult<RawStmt> {
        let (raw, trailing) = self.compile(sql, persistent)?;
        let Some(raw) = raw else {
            return Err(DbError::new(
                ErrorKind::Prepare,
                ResultCode::Error,
                "no SQL statement in input",
            ));
        };
        let rest = sql.get(sql.len() - trailing..).unwrap_or_default();
        if !rest.trim().is_empty() {
            return Err(DbError::new(
                ErrorKind::Prepare,
                ResultCode::Error,
                format!("trailing content after statement: {rest:?}"),
            ));
        }
        Ok(raw)
    }

    /// Prepares a single SQL statement.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors (with the offending position), on empty input
    /// and on any non-whitespace content after the statement, comments
    /// included.
    pub fn prepare(&self, sql: &str) -> DbResult<Statement<'_>> {
        let raw = self.compile_one(sql, false)?;
        Ok(Statement::new(self, raw))
    }

    /// Prepares the first statement of `sql`, returning it with the number
    /// of bytes left unconsumed.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors and when `sql` holds no statement.
    pub fn prepare_transient(&self, sql: &str) -> DbResult<(Statement<'_>, usize)> {
        self.prepare_next(sql)?.ok_or_else(|| {
            DbError::new(
                ErrorKind::Prepare,
                ResultCode::Error,
                "no SQL statement in input",
            )
        })
    }

    /// Like [`prepare_transient`](Self::prepare_transient), but returns
    /// `None` when `sql` holds only whitespace and comments.
    ///
    /// # Errors
    ///
    /// Fails on syntax errors.
    pub fn prepare_next(&self, sql: &str) -> DbResult<Option<(Statement<'_>, usize)>> {
        let (raw, trailing) = self.compile(sql, false)?;
        Ok(raw.map(|raw| (Statement::new(self, raw), trailing)))
    }

    /// Returns a cached statement for `sql`, compiling it on first use.
    ///
    /// The statement goes back to the cache, reset and with its bindings
    /// cleared, when the returned guard drops.
    ///
    /// # Errors
    ///
    /// As [`prepare`](Self::prepare).
    pub fn prep(&self, sql: &str) -> DbResult<CachedStatement<'_>> {
        self.check_interrupt(ErrorKind::Prepare)?;
        let raw = match self.cache.take(sql) {
            Some(raw) => raw,
            None => {
                log::debug!("statement cache miss: {sql:?}");
                self.compile_one(sql, true)?
            }
        };
        Ok(CachedStatement::new(Statement::new(self, raw), sql))
    }

    /// Number of idle statements held by the cache.
    #[must_use]
    pub fn cached_statements(&self) -> usize {
        self.cache.len()
    }

    // ── Interrupts and busy handling ────────────────────────────────────

    /// Installs `signal` (or clears it with `None`), returning the previous
    /// one.
    ///
    /// While the installed signal is fired every native call fails with an
    /// interrupt error, long-running statements are aborted and busy waits
    /// end early.
    pub fn set_interrupt(&self, signal: Option<InterruptSignal>) -> Option<InterruptSignal> {
        self.db.handlers().set_interrupt(signal)
    }

    /// Whether the installed signal has fired.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.db.handlers().is_interrupted()
    }

    /// Retries lock contention for up to `timeout`; zero returns busy
    /// immediately.
    pub fn set_busy_timeout(&self, timeout: Duration) {
        self.db
            .handlers()
            .set_policy(BusyPolicy::from_timeout(timeout));
    }

    /// Waits for locks until the interrupt signal fires, indefinitely if no
    /// signal is installed.
    pub fn set_block_on_busy(&self) {
        self.db.handlers().set_policy(BusyPolicy::UntilInterrupted);
    }

    /// The current busy policy.
    #[must_use]
    pub fn busy_policy(&self) -> BusyPolicy {
        self.db.handlers().policy()
    }

    // ── Configuration ───────────────────────────────────────────────────

    /// Current value of a resource limit.
    #[must_use]
    pub fn limit(&self, limit: Limit) -> i32 {
        self.db.limit(limit.id(), -1)
    }

    /// Lowers (or raises, up to the compile-time maximum) a resource limit,
    /// returning the previous value.
    pub fn set_limit(&self, limit: Limit, value: i32) -> i32 {
        self.db.limit(limit.id(), value.max(0))
    }

    /// Toggles defensive mode, which forbids writes that could corrupt the
    /// database file (such as editing `sqlite_schema`).
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Config`] error if the engine refuses.
    pub fn set_defensive(&self, enabled: bool) -> DbResult<()> {
        match self
            .db
            .db_config_flag(ffi::SQLITE_DBCONFIG_DEFENSIVE, enabled)
        {
            ffi::SQLITE_OK => Ok(()),
            rc => Err(self.error(ErrorKind::Config, rc)),
        }
    }

    // ── Serialization ───────────────────────────────────────────────────

    /// Copies the entire image of `schema` (`"main"`, `"temp"` or an
    /// attached name).
    ///
    /// # Errors
    ///
    /// Fails when interrupted or when the schema does not exist.
    pub fn serialize(&self, schema: &str) -> DbResult<Vec<u8>> {
        self.check_interrupt(ErrorKind::Serialize)?;
        self.db.serialize(schema_name(schema)).ok_or_else(|| {
            DbError::new(
                ErrorKind::Serialize,
                ResultCode::Error,
                format!("cannot serialize schema {schema:?}"),
            )
        })
    }

    /// Replaces `schema` with a copy of `image`.
    ///
    /// # Errors
    ///
    /// Fails with a busy error while any statement on this connection is
    /// mid-execution, and with the engine's error otherwise.
    pub fn deserialize(&self, schema: &str, image: &[u8]) -> DbResult<()> {
        self.check_interrupt(ErrorKind::Deserialize)?;
        if self.db.has_busy_statements() {
            return Err(DbError::new(
                ErrorKind::Deserialize,
                ResultCode::Busy,
                "statements are still executing",
            ));
        }
        match self.db.deserialize(schema_name(schema), image) {
            ffi::SQLITE_OK => Ok(()),
            rc => Err(self.error(ErrorKind::Deserialize, rc)),
        }
    }

    // ── Blobs ───────────────────────────────────────────────────────────

    /// Opens the value at `table.column` of row `rowid` for incremental
    /// I/O. An empty `schema` means `"main"`.
    ///
    /// # Errors
    ///
    /// Fails if the row does not exist or the value is not text or a blob.
    pub fn open_blob(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        rowid: i64,
        writable: bool,
    ) -> DbResult<Blob<'_>> {
        self.check_interrupt(ErrorKind::Blob)?;
        let raw = self
            .db
            .blob_open(schema_name(schema), table, column, rowid, writable)
            .map_err(|rc| self.error(ErrorKind::Blob, rc))?;
        Ok(Blob::new(self, raw, writable))
    }

    // ── Introspection ───────────────────────────────────────────────────

    /// Returns the number of rows changed by the most recent statement.
    #[must_use]
    pub fn changes(&self) -> usize {
        usize::try_from(self.db.changes()).unwrap_or(0)
    }

    /// Returns the rowid of the most recent successful INSERT.
    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.db.last_insert_rowid()
    }

    /// Whether no transaction is open.
    #[must_use]
    pub fn autocommit(&self) -> bool {
        self.db.autocommit()
    }

    /// The path the connection was opened with.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The effective open flags.
    #[must_use]
    pub const fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// Number of live statements and blobs borrowed from this connection,
    /// not counting idle cached statements.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.live_statements.get() + self.live_blobs.get()
    }
}

fn schema_name(schema: &str) -> &str {
    if schema.is_empty() {
        "main"
    } else {
        schema
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
