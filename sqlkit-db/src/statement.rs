//! Safe wrapper around a `SQLite` prepared statement.
//!
//! This file contains **no `unsafe` code**. All FFI interaction is delegated to
//! [`ffi::RawStmt`] which encapsulates the raw pointers and C type conversions.
//!
//! Setters latch the first failure instead of returning it; the latched error
//! is reported by the next [`Statement::step`]. This keeps long runs of
//! `set_*` calls free of error plumbing while still naming the parameter
//! that went wrong.

use std::cell::{Cell, OnceCell};
use std::collections::HashMap;
use std::fmt;
use std::os::raw::c_int;

use crate::code::ResultCode;
use crate::connection::Connection;
use crate::error::{DbError, DbResult, ErrorKind};
use crate::ffi::{self, RawStmt};
use crate::value::{ColumnType, Value};

/// Result of a single `sqlite3_step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A result row is available.
    Row,
    /// The statement has finished executing.
    Done,
}

impl StepResult {
    /// Whether a row is available.
    #[must_use]
    pub const fn is_row(self) -> bool {
        matches!(self, Self::Row)
    }
}

/// Where a statement is in its execution lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Freshly prepared or reset; the next step starts execution.
    Ready,
    /// The last step produced a row.
    HasRow,
    /// Execution finished, successfully or not.
    Done,
    /// An interrupt was observed; every step fails until a reset succeeds.
    Interrupted,
}

/// Counts one live handle against its connection while it exists.
pub(crate) struct LiveGuard<'conn> {
    count: &'conn Cell<usize>,
}

impl<'conn> LiveGuard<'conn> {
    pub(crate) fn new(count: &'conn Cell<usize>) -> Self {
        count.set(count.get() + 1);
        Self { count }
    }
}

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.count.set(self.count.get().saturating_sub(1));
    }
}

/// A prepared `SQLite` statement.
///
/// Created via [`Connection::prepare`] and its variants. Borrows the
/// connection that created it, so it can never outlive it. Finalized when
/// dropped or by [`finalize`](Self::finalize).
pub struct Statement<'conn> {
    conn: &'conn Connection,
    raw: RawStmt,
    state: StatementState,
    bind_error: Option<DbError>,
    /// Code of the last failed step; reset and finalize repeat it.
    last_failure: c_int,
    columns: OnceCell<HashMap<String, usize>>,
    _live: LiveGuard<'conn>,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn new(conn: &'conn Connection, raw: RawStmt) -> Self {
        Self {
            conn,
            raw,
            state: StatementState::Ready,
            bind_error: None,
            last_failure: ffi::SQLITE_OK,
            columns: OnceCell::new(),
            _live: LiveGuard::new(conn.live_statements()),
        }
    }

    /// Gives up the handle, along with the code of its last failed step.
    pub(crate) fn into_raw(self) -> (RawStmt, c_int) {
        let Self {
            raw, last_failure, ..
        } = self;
        (raw, last_failure)
    }

    /// The connection this statement belongs to.
    #[must_use]
    pub const fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> StatementState {
        self.state
    }

    /// The SQL text this statement was compiled from.
    #[must_use]
    pub fn sql(&self) -> String {
        self.raw.sql()
    }

    /// Whether the statement makes no direct changes to the database.
    #[must_use]
    pub fn readonly(&self) -> bool {
        self.raw.readonly()
    }

    // ── Execution ───────────────────────────────────────────────────────

    /// Evaluates the statement up to the next row.
    ///
    /// # Errors
    ///
    /// Returns the latched bind error first, then an interrupt error while
    /// the connection's signal is fired or the statement is
    /// [`Interrupted`](StatementState::Interrupted), then any engine error.
    pub fn step(&mut self) -> DbResult<StepResult> {
        if let Some(err) = self.bind_error.take() {
            return Err(err);
        }
        if self.state == StatementState::Interrupted || self.conn.is_interrupted() {
            self.state = StatementState::Interrupted;
            return Err(DbError::interrupted(ErrorKind::Step));
        }
        match self.raw.step() {
            ffi::SQLITE_ROW => {
                self.state = StatementState::HasRow;
                Ok(StepResult::Row)
            }
            ffi::SQLITE_DONE => {
                self.state = StatementState::Done;
                Ok(StepResult::Done)
            }
            rc => {
                self.last_failure = rc;
                let err = self.conn.error(ErrorKind::Step, rc);
                self.state = if err.is_interrupted() {
                    StatementState::Interrupted
                } else {
                    StatementState::Done
                };
                Err(err)
            }
        }
    }

    /// Steps until the statement is done, discarding rows.
    ///
    /// # Errors
    ///
    /// As [`step`](Self::step).
    pub fn step_to_end(&mut self) -> DbResult<()> {
        while self.step()?.is_row() {}
        Ok(())
    }

    /// Rewinds the statement so it can be stepped again. Bindings are kept.
    ///
    /// # Errors
    ///
    /// Fails with an interrupt error while the connection's signal is fired.
    pub fn reset(&mut self) -> DbResult<()> {
        if self.conn.is_interrupted() {
            self.state = StatementState::Interrupted;
            return Err(DbError::interrupted(ErrorKind::Reset));
        }
        if self.state == StatementState::Ready {
            return Ok(());
        }
        match self.rewind() {
            ffi::SQLITE_OK => Ok(()),
            rc => Err(self.conn.error(ErrorKind::Reset, rc)),
        }
    }

    /// Resets the engine handle without consulting the interrupt. Returns
    /// `SQLITE_OK` unless the engine reports something new.
    pub(crate) fn rewind(&mut self) -> c_int {
        let rc = self.raw.reset();
        let last = std::mem::replace(&mut self.last_failure, ffi::SQLITE_OK);
        self.state = StatementState::Ready;
        if rc == last {
            ffi::SQLITE_OK
        } else {
            rc
        }
    }

    /// Sets every parameter back to NULL and drops a latched bind error.
    pub fn clear_bindings(&mut self) {
        self.raw.clear_bindings();
        self.bind_error = None;
    }

    /// Releases the handle.
    ///
    /// # Errors
    ///
    /// Returns an engine error other than the one already reported by the
    /// last failed step.
    pub fn finalize(self) -> DbResult<()> {
        let conn = self.conn;
        let (raw, last_failure) = self.into_raw();
        match raw.finalize() {
            rc if rc == ffi::SQLITE_OK || rc == last_failure => Ok(()),
            rc => Err(conn.error(ErrorKind::Finalize, rc)),
        }
    }

    // ── Parameter binding ───────────────────────────────────────────────

    /// Number of parameters; the largest index when numbered markers are
    /// used.
    #[must_use]
    pub fn bind_param_count(&self) -> usize {
        usize::try_from(self.raw.bind_parameter_count()).unwrap_or(0)
    }

    /// Name of the 1-based parameter `param`, marker included (`":foo"`).
    /// `None` for anonymous `?` parameters and out-of-range indices.
    #[must_use]
    pub fn bind_param_name(&self, param: usize) -> Option<String> {
        let idx = c_int::try_from(param).ok()?;
        self.raw.bind_parameter_name(idx)
    }

    /// 1-based index of the parameter called `name` (marker included).
    #[must_use]
    pub fn bind_param_index(&self, name: &str) -> Option<usize> {
        usize::try_from(self.raw.bind_parameter_index(name))
            .ok()
            .filter(|&idx| idx > 0)
    }

    fn latch(&mut self, rc: c_int, what: impl FnOnce() -> String) {
        if rc != ffi::SQLITE_OK && self.bind_error.is_none() {
            let message = format!("{}: {}", what(), ffi::errstr(rc));
            self.bind_error = Some(DbError::new(
                ErrorKind::Bind,
                ResultCode::from_code(rc),
                message,
            ));
        }
    }

    fn bind_with(&mut self, param: usize, bind: impl FnOnce(&RawStmt, c_int) -> c_int) {
        let rc = c_int::try_from(param).map_or(ffi::SQLITE_RANGE, |idx| bind(&self.raw, idx));
        self.latch(rc, || format!("bind parameter {param}"));
    }

    fn set_with(&mut self, name: &str, bind: impl FnOnce(&RawStmt, c_int) -> c_int) {
        let rc = match self.raw.bind_parameter_index(name) {
            0 => {
                self.latch(ffi::SQLITE_RANGE, || format!("unknown parameter {name}"));
                return;
            }
            idx => bind(&self.raw, idx),
        };
        self.latch(rc, || format!("bind parameter {name}"));
    }

    /// Binds an integer to the 1-based parameter `param`.
    pub fn bind_int64(&mut self, param: usize, value: i64) {
        self.bind_with(param, |raw, idx| raw.bind_int64(idx, value));
    }

    /// Binds an integer to the 1-based parameter `param`.
    pub fn bind_int(&mut self, param: usize, value: i32) {
        self.bind_int64(param, i64::from(value));
    }

    /// Binds a float to the 1-based parameter `param`.
    pub fn bind_float(&mut self, param: usize, value: f64) {
        self.bind_with(param, |raw, idx| raw.bind_double(idx, value));
    }

    /// Binds `1` or `0` to the 1-based parameter `param`.
    pub fn bind_bool(&mut self, param: usize, value: bool) {
        self.bind_int64(param, i64::from(value));
    }

    /// Binds text to the 1-based parameter `param`.
    pub fn bind_text(&mut self, param: usize, value: &str) {
        self.bind_with(param, |raw, idx| raw.bind_text(idx, value));
    }

    /// Binds a blob to the 1-based parameter `param`.
    pub fn bind_bytes(&mut self, param: usize, value: &[u8]) {
        self.bind_with(param, |raw, idx| raw.bind_blob(idx, value));
    }

    /// Binds a zero-filled blob of `len` bytes to the 1-based parameter
    /// `param`, for later writing through a [`Blob`](crate::Blob).
    pub fn bind_zero_blob(&mut self, param: usize, len: usize) {
        match c_int::try_from(len) {
            Ok(len) => self.bind_with(param, |raw, idx| raw.bind_zeroblob(idx, len)),
            Err(_) => self.latch(ffi::SQLITE_TOOBIG, || format!("bind parameter {param}")),
        }
    }

    /// Binds NULL to the 1-based parameter `param`.
    pub fn bind_null(&mut self, param: usize) {
        self.bind_with(param, RawStmt::bind_null);
    }

    /// Binds any [`Value`] to the 1-based parameter `param`.
    pub fn bind_value(&mut self, param: usize, value: &Value) {
        self.bind_with(param, |raw, idx| bind_raw(raw, idx, value));
    }

    /// Binds a slice of [`Value`]s to the statement parameters (1-indexed).
    ///
    /// # Errors
    ///
    /// Returns the first binding failure immediately.
    pub fn bind_values(&mut self, values: &[Value]) -> DbResult<()> {
        for (i, value) in values.iter().enumerate() {
            self.bind_value(i + 1, value);
            if let Some(err) = self.bind_error.take() {
                return Err(err);
            }
        }
        Ok(())
    }

    /// Binds an integer to the parameter called `name`.
    pub fn set_int64(&mut self, name: &str, value: i64) {
        self.set_with(name, |raw, idx| raw.bind_int64(idx, value));
    }

    /// Binds an integer to the parameter called `name`.
    pub fn set_int(&mut self, name: &str, value: i32) {
        self.set_int64(name, i64::from(value));
    }

    /// Binds a float to the parameter called `name`.
    pub fn set_float(&mut self, name: &str, value: f64) {
        self.set_with(name, |raw, idx| raw.bind_double(idx, value));
    }

    /// Binds `1` or `0` to the parameter called `name`.
    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.set_int64(name, i64::from(value));
    }

    /// Binds text to the parameter called `name`.
    pub fn set_text(&mut self, name: &str, value: &str) {
        self.set_with(name, |raw, idx| raw.bind_text(idx, value));
    }

    /// Binds a blob to the parameter called `name`.
    pub fn set_bytes(&mut self, name: &str, value: &[u8]) {
        self.set_with(name, |raw, idx| raw.bind_blob(idx, value));
    }

    /// Binds a zero-filled blob of `len` bytes to the parameter called
    /// `name`.
    pub fn set_zero_blob(&mut self, name: &str, len: usize) {
        match c_int::try_from(len) {
            Ok(len) => self.set_with(name, |raw, idx| raw.bind_zeroblob(idx, len)),
            Err(_) => self.latch(ffi::SQLITE_TOOBIG, || format!("bind parameter {name}")),
        }
    }

    /// Binds NULL to the parameter called `name`.
    pub fn set_null(&mut self, name: &str) {
        self.set_with(name, RawStmt::bind_null);
    }

    /// Binds any [`Value`] to the parameter called `name`.
    pub fn set_value(&mut self, name: &str, value: &Value) {
        self.set_with(name, |raw, idx| bind_raw(raw, idx, value));
    }

    // ── Column reading ──────────────────────────────────────────────────

    /// Number of columns in the result set.
    #[must_use]
    pub fn column_count(&self) -> usize {
        usize::try_from(self.raw.column_count()).unwrap_or(0)
    }

    /// Number of columns in the current row; zero without a row.
    #[must_use]
    pub fn data_count(&self) -> usize {
        usize::try_from(self.raw.data_count()).unwrap_or(0)
    }

    /// Name of column `col`.
    #[must_use]
    pub fn column_name(&self, col: usize) -> Option<String> {
        let idx = c_int::try_from(col).ok()?;
        self.raw.column_name(idx)
    }

    /// Index of the first column called `name`, compared ASCII
    /// case-insensitively.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .get_or_init(|| {
                let mut columns = HashMap::new();
                for col in 0..self.column_count() {
                    if let Some(name) = self.column_name(col) {
                        columns.entry(name.to_ascii_lowercase()).or_insert(col);
                    }
                }
                columns
            })
            .get(&name.to_ascii_lowercase())
            .copied()
    }

    /// Column index usable on the current row.
    fn col(&self, col: usize) -> Option<c_int> {
        if self.state != StatementState::HasRow {
            return None;
        }
        c_int::try_from(col)
            .ok()
            .filter(|&idx| idx < self.raw.data_count())
    }

    /// Storage class of column `col`; NULL without a row.
    #[must_use]
    pub fn column_type(&self, col: usize) -> ColumnType {
        self.col(col).map_or(ColumnType::Null, |idx| {
            match self.raw.column_type(idx) {
                ffi::SQLITE_INTEGER => ColumnType::Integer,
                ffi::SQLITE_FLOAT => ColumnType::Float,
                ffi::SQLITE_TEXT => ColumnType::Text,
                ffi::SQLITE_BLOB => ColumnType::Blob,
                _ => ColumnType::Null,
            }
        })
    }

    /// Reads a column as `i64`. Returns `0` for NULL.
    #[must_use]
    pub fn column_int64(&self, col: usize) -> i64 {
        self.col(col).map_or(0, |idx| self.raw.column_int64(idx))
    }

    /// Reads a column as `i32`, keeping the low 32 bits like
    /// `sqlite3_column_int`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn column_int(&self, col: usize) -> i32 {
        self.column_int64(col) as i32
    }

    /// Reads a column as `f64`. Returns `0.0` for NULL.
    #[must_use]
    pub fn column_float(&self, col: usize) -> f64 {
        self.col(col).map_or(0.0, |idx| self.raw.column_double(idx))
    }

    /// Reads a column as a boolean: any non-zero integer is `true`.
    #[must_use]
    pub fn column_bool(&self, col: usize) -> bool {
        self.column_int64(col) != 0
    }

    /// Reads a column as a UTF-8 string. Returns an empty string for NULL.
    #[must_use]
    pub fn column_text(&self, col: usize) -> String {
        self.col(col).map_or_else(String::new, |idx| {
            String::from_utf8(self.raw.column_text(idx))
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
        })
    }

    /// Reads a column as a blob. Returns an empty `Vec` for NULL.
    #[must_use]
    pub fn column_bytes(&self, col: usize) -> Vec<u8> {
        self.col(col)
            .map_or_else(Vec::new, |idx| self.raw.column_blob(idx))
    }

    /// Length in bytes of a text or blob column.
    #[must_use]
    pub fn column_len(&self, col: usize) -> usize {
        self.col(col).map_or(0, |idx| {
            usize::try_from(self.raw.column_bytes(idx)).unwrap_or(0)
        })
    }

    /// Reads a column in its own storage class.
    #[must_use]
    pub fn column_value(&self, col: usize) -> Value {
        match self.column_type(col) {
            ColumnType::Integer => Value::Integer(self.column_int64(col)),
            ColumnType::Float => Value::Float(self.column_float(col)),
            ColumnType::Text => Value::Text(self.column_text(col)),
            ColumnType::Blob => Value::Blob(self.column_bytes(col)),
            ColumnType::Null => Value::Null,
        }
    }

    /// Returns `true` if the column is SQL NULL.
    #[must_use]
    pub fn is_column_null(&self, col: usize) -> bool {
        self.column_type(col) == ColumnType::Null
    }

    // ── Column reading by name ──────────────────────────────────────────

    /// [`column_int64`](Self::column_int64) of the column called `name`.
    #[must_use]
    pub fn get_int64(&self, name: &str) -> i64 {
        self.column_index(name).map_or(0, |col| self.column_int64(col))
    }

    /// [`column_int`](Self::column_int) of the column called `name`.
    #[must_use]
    pub fn get_int(&self, name: &str) -> i32 {
        self.column_index(name).map_or(0, |col| self.column_int(col))
    }

    /// [`column_float`](Self::column_float) of the column called `name`.
    #[must_use]
    pub fn get_float(&self, name: &str) -> f64 {
        self.column_index(name)
            .map_or(0.0, |col| self.column_float(col))
    }

    /// [`column_bool`](Self::column_bool) of the column called `name`.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> bool {
        self.column_index(name)
            .is_some_and(|col| self.column_bool(col))
    }

    /// [`column_text`](Self::column_text) of the column called `name`.
    #[must_use]
    pub fn get_text(&self, name: &str) -> String {
        self.column_index(name)
            .map_or_else(String::new, |col| self.column_text(col))
    }

    /// [`column_bytes`](Self::column_bytes) of the column called `name`.
    #[must_use]
    pub fn get_bytes(&self, name: &str) -> Vec<u8> {
        self.column_index(name)
            .map_or_else(Vec::new, |col| self.column_bytes(col))
    }

    /// [`column_len`](Self::column_len) of the column called `name`.
    #[must_use]
    pub fn get_len(&self, name: &str) -> usize {
        self.column_index(name).map_or(0, |col| self.column_len(col))
    }
}

fn bind_raw(raw: &RawStmt, idx: c_int, value: &Value) -> c_int {
    match value {
        Value::Integer(v) => raw.bind_int64(idx, *v),
        Value::Float(v) => raw.bind_double(idx, *v),
        Value::Text(v) => raw.bind_text(idx, v),
        Value::Blob(v) => raw.bind_blob(idx, v),
        Value::Null => raw.bind_null(idx),
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.raw.sql())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
