//! Raw FFI wrappers over the `SQLite` C API.
//!
//! Symbols come from `libsqlite3-sys`, built from its bundled amalgamation.
//! Each raw handle lives in a wrapper type whose `Drop` releases it exactly
//! once: [`RawDb`] owns `sqlite3*`, [`RawStmt`] owns `sqlite3_stmt*` and
//! [`RawBlob`] owns `sqlite3_blob*`. This is the **only** file that contains
//! `unsafe` code or C types; everything above it works with safe values and
//! plain `c_int` result codes.

#![allow(unsafe_code)]

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::{self, NonNull};

use libsqlite3_sys as sys;

use crate::busy::{Handlers, PROGRESS_INTERVAL};

pub use sys::{
    SQLITE_BLOB, SQLITE_DONE, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_OK, SQLITE_RANGE, SQLITE_ROW,
    SQLITE_TEXT, SQLITE_TOOBIG,
};
use sys::{SQLITE_ERROR, SQLITE_MISUSE, SQLITE_NOMEM};

/// `sqlite3_db_config` verbs toggled by [`RawDb::db_config_flag`].
pub const SQLITE_DBCONFIG_DEFENSIVE: c_int = 1010;
/// Double-quoted string literals in DML.
pub const SQLITE_DBCONFIG_DQS_DML: c_int = 1013;
/// Double-quoted string literals in DDL.
pub const SQLITE_DBCONFIG_DQS_DDL: c_int = 1014;

// `sqlite3_prepare_v3` and `sqlite3_deserialize` take unsigned flag words.
const PREPARE_PERSISTENT: c_uint = 0x01;
const DESERIALIZE_OWNED: c_uint = 1 | 2; // FREEONCLOSE | RESIZEABLE

fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: the engine hands out NUL-terminated strings that stay valid
    // until the next call on the same handle; we copy immediately.
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn c_string(s: &str) -> Option<CString> {
    CString::new(s).ok()
}

/// Copies `len` bytes starting at `ptr`; null or empty yields an empty vec.
fn copy_bytes(ptr: *const c_void, len: c_int) -> Vec<u8> {
    let Ok(len) = usize::try_from(len) else {
        return Vec::new();
    };
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    // SAFETY: the engine guarantees `len` readable bytes at `ptr`.
    unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), len) }.to_vec()
}

/// Human-readable text for a result code.
pub fn errstr(code: c_int) -> String {
    // SAFETY: sqlite3_errstr returns a static string for any input.
    owned_string(unsafe { sys::sqlite3_errstr(code) }).unwrap_or_default()
}

// ── Callback trampolines ────────────────────────────────────────────────

unsafe extern "C" fn busy_trampoline(arg: *mut c_void, count: c_int) -> c_int {
    // SAFETY: `arg` is the `Handlers` allocation owned by the `RawDb` that
    // registered this callback; it outlives the native handle.
    let handlers = unsafe { &*arg.cast::<Handlers>() };
    let count = usize::try_from(count).unwrap_or(0);
    catch_unwind(AssertUnwindSafe(|| handlers.on_busy(count))).map_or(0, c_int::from)
}

unsafe extern "C" fn progress_trampoline(arg: *mut c_void) -> c_int {
    // SAFETY: see `busy_trampoline`.
    let handlers = unsafe { &*arg.cast::<Handlers>() };
    catch_unwind(AssertUnwindSafe(|| handlers.on_progress())).map_or(1, c_int::from)
}

// ── Database handle ─────────────────────────────────────────────────────

/// Owned `sqlite3*` together with the callback state registered on it.
pub struct RawDb {
    /// Null once closed.
    ptr: *mut sys::sqlite3,
    handlers: Box<Handlers>,
}

// SAFETY: the handle is opened in multi-thread mode and only ever used by
// one thread at a time (`Connection` is `Send` but not `Sync`).
unsafe impl Send for RawDb {}

impl RawDb {
    /// Opens a database, returning the code and message on failure.
    pub fn open(path: &str, flags: c_int) -> Result<Self, (c_int, String)> {
        let c_path =
            c_string(path).ok_or_else(|| (SQLITE_MISUSE, "path contains a NUL byte".to_string()))?;
        let mut db: *mut sys::sqlite3 = ptr::null_mut();
        // SAFETY: valid C string and out-pointer.
        let rc = unsafe { sys::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };
        if rc != SQLITE_OK {
            // If open failed but we got a handle, extract the error and close.
            let msg = if db.is_null() {
                errstr(rc)
            } else {
                // SAFETY: `db` is a handle returned by sqlite3_open_v2.
                let m = owned_string(unsafe { sys::sqlite3_errmsg(db) }).unwrap_or_default();
                unsafe {
                    sys::sqlite3_close_v2(db);
                }
                m
            };
            return Err((rc, msg));
        }
        let raw = Self {
            ptr: db,
            handlers: Box::new(Handlers::new()),
        };
        raw.install_handlers();
        Ok(raw)
    }

    fn install_handlers(&self) {
        let handlers: &Handlers = &self.handlers;
        let arg = ptr::from_ref(handlers).cast_mut().cast::<c_void>();
        // SAFETY: `handlers` is boxed, so its address is stable, and it is
        // dropped only after the handle is closed.
        unsafe {
            sys::sqlite3_extended_result_codes(self.ptr, 1);
            sys::sqlite3_busy_handler(self.ptr, Some(busy_trampoline), arg);
            sys::sqlite3_progress_handler(
                self.ptr,
                PROGRESS_INTERVAL,
                Some(progress_trampoline),
                arg,
            );
        }
    }

    fn remove_handlers(&self) {
        // SAFETY: clearing callbacks on a live handle.
        unsafe {
            sys::sqlite3_busy_handler(self.ptr, None, ptr::null_mut());
            sys::sqlite3_progress_handler(self.ptr, 0, None, ptr::null_mut());
        }
    }

    /// The callback state registered with the engine.
    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// Closes the handle with `sqlite3_close`, which refuses while any
    /// statement or blob is unfinalized. On failure the handle stays open.
    pub fn close(&mut self) -> c_int {
        if self.ptr.is_null() {
            return SQLITE_OK;
        }
        // SAFETY: live handle.
        let rc = unsafe { sys::sqlite3_close(self.ptr) };
        if rc == SQLITE_OK {
            self.ptr = ptr::null_mut();
        }
        rc
    }

    // ── Error reporting ─────────────────────────────────────────────────

    pub fn errmsg(&self) -> String {
        // SAFETY: live handle.
        owned_string(unsafe { sys::sqlite3_errmsg(self.ptr) })
            .unwrap_or_else(|| "unknown error".to_string())
    }

    pub fn extended_errcode(&self) -> c_int {
        // SAFETY: live handle.
        unsafe { sys::sqlite3_extended_errcode(self.ptr) }
    }

    /// Byte offset of the token that caused the most recent error.
    pub fn error_offset(&self) -> Option<usize> {
        // SAFETY: live handle.
        usize::try_from(unsafe { sys::sqlite3_error_offset(self.ptr) }).ok()
    }

    // ── Execution ───────────────────────────────────────────────────────

    /// Compiles the first statement of `sql`.
    ///
    /// Returns the result code, the statement (absent when `sql` holds no
    /// statement or on error) and the number of unconsumed trailing bytes.
    pub fn prepare(&self, sql: &str, persistent: bool) -> (c_int, Option<RawStmt>, usize) {
        let Ok(len) = c_int::try_from(sql.len()) else {
            return (SQLITE_TOOBIG, None, 0);
        };
        let flags = if persistent { PREPARE_PERSISTENT } else { 0 };
        let mut stmt: *mut sys::sqlite3_stmt = ptr::null_mut();
        let mut tail: *const c_char = ptr::null();
        // SAFETY: `sql` is valid for `len` bytes; out-pointers are valid.
        let rc = unsafe {
            sys::sqlite3_prepare_v3(
                self.ptr,
                sql.as_ptr().cast::<c_char>(),
                len,
                flags,
                &mut stmt,
                &mut tail,
            )
        };
        let consumed = if tail.is_null() {
            sql.len()
        } else {
            tail.addr().saturating_sub(sql.as_ptr().addr())
        };
        let stmt = NonNull::new(stmt).map(|ptr| RawStmt { ptr });
        (rc, stmt, sql.len().saturating_sub(consumed))
    }

    /// Runs `sql` with `sqlite3_exec`, discarding rows.
    pub fn exec(&self, sql: &str) -> c_int {
        let Some(c_sql) = c_string(sql) else {
            return SQLITE_MISUSE;
        };
        // SAFETY: valid C string; no callback, no errmsg out-pointer.
        unsafe {
            sys::sqlite3_exec(
                self.ptr,
                c_sql.as_ptr(),
                None,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        }
    }

    /// Toggles a boolean `sqlite3_db_config` option.
    pub fn db_config_flag(&self, op: c_int, enabled: bool) -> c_int {
        let mut out: c_int = 0;
        // SAFETY: boolean db_config verbs take an int and an int out-pointer.
        unsafe { sys::sqlite3_db_config(self.ptr, op, c_int::from(enabled), &mut out as *mut c_int) }
    }

    pub fn limit(&self, id: c_int, value: c_int) -> c_int {
        // SAFETY: live handle; out-of-range ids return -1.
        unsafe { sys::sqlite3_limit(self.ptr, id, value) }
    }

    pub fn changes(&self) -> i64 {
        // SAFETY: live handle.
        i64::from(unsafe { sys::sqlite3_changes(self.ptr) })
    }

    pub fn last_insert_rowid(&self) -> i64 {
        // SAFETY: live handle.
        unsafe { sys::sqlite3_last_insert_rowid(self.ptr) }
    }

    pub fn autocommit(&self) -> bool {
        // SAFETY: live handle.
        unsafe { sys::sqlite3_get_autocommit(self.ptr) != 0 }
    }

    /// Whether any statement on this handle is mid-execution.
    pub fn has_busy_statements(&self) -> bool {
        // SAFETY: walking the handle's statement list without retaining any
        // pointer past the loop.
        unsafe {
            let mut stmt = sys::sqlite3_next_stmt(self.ptr, ptr::null_mut());
            while !stmt.is_null() {
                if sys::sqlite3_stmt_busy(stmt) != 0 {
                    return true;
                }
                stmt = sys::sqlite3_next_stmt(self.ptr, stmt);
            }
        }
        false
    }

    // ── Serialization ───────────────────────────────────────────────────

    /// Copies the image of `schema`, or `None` if the engine produced none.
    pub fn serialize(&self, schema: &str) -> Option<Vec<u8>> {
        let c_schema = c_string(schema)?;
        let mut size: i64 = 0;
        // SAFETY: flags 0 asks for a freshly allocated copy, released below.
        unsafe {
            let data = sys::sqlite3_serialize(self.ptr, c_schema.as_ptr(), &mut size, 0);
            if data.is_null() {
                return None;
            }
            let len = usize::try_from(size).unwrap_or(0);
            let bytes = std::slice::from_raw_parts(data.cast_const(), len).to_vec();
            sys::sqlite3_free(data.cast::<c_void>());
            Some(bytes)
        }
    }

    /// Replaces `schema` with `image`.
    pub fn deserialize(&self, schema: &str, image: &[u8]) -> c_int {
        let Some(c_schema) = c_string(schema) else {
            return SQLITE_MISUSE;
        };
        let Ok(size) = i64::try_from(image.len()) else {
            return SQLITE_TOOBIG;
        };
        // SAFETY: the buffer is allocated with sqlite3_malloc64 and handed
        // over with FREEONCLOSE, so the engine frees it (even on failure).
        unsafe {
            let buf = sys::sqlite3_malloc64(image.len().max(1) as u64).cast::<u8>();
            if buf.is_null() {
                return SQLITE_NOMEM;
            }
            ptr::copy_nonoverlapping(image.as_ptr(), buf, image.len());
            sys::sqlite3_deserialize(
                self.ptr,
                c_schema.as_ptr(),
                buf,
                size,
                size,
                DESERIALIZE_OWNED,
            )
        }
    }

    // ── Blobs ───────────────────────────────────────────────────────────

    pub fn blob_open(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        rowid: i64,
        writable: bool,
    ) -> Result<RawBlob, c_int> {
        let (Some(schema), Some(table), Some(column)) =
            (c_string(schema), c_string(table), c_string(column))
        else {
            return Err(SQLITE_MISUSE);
        };
        let mut blob: *mut sys::sqlite3_blob = ptr::null_mut();
        // SAFETY: valid C strings and out-pointer.
        let rc = unsafe {
            sys::sqlite3_blob_open(
                self.ptr,
                schema.as_ptr(),
                table.as_ptr(),
                column.as_ptr(),
                rowid,
                c_int::from(writable),
                &mut blob,
            )
        };
        match NonNull::new(blob) {
            Some(ptr) if rc == SQLITE_OK => Ok(RawBlob { ptr }),
            Some(ptr) => {
                drop(RawBlob { ptr });
                Err(rc)
            }
            None => Err(if rc == SQLITE_OK { SQLITE_ERROR } else { rc }),
        }
    }
}

impl Drop for RawDb {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            self.remove_handlers();
            // SAFETY: close_v2 defers the release until leaked children are
            // finalized, so it is always safe to call here.
            unsafe {
                sys::sqlite3_close_v2(self.ptr);
            }
            self.ptr = ptr::null_mut();
        }
    }
}

// ── Statement handle ────────────────────────────────────────────────────

/// Owned `sqlite3_stmt*`, finalized on drop.
pub struct RawStmt {
    ptr: NonNull<sys::sqlite3_stmt>,
}

// SAFETY: moved together with (and only used alongside) its connection.
unsafe impl Send for RawStmt {}

impl RawStmt {
    const fn as_ptr(&self) -> *mut sys::sqlite3_stmt {
        self.ptr.as_ptr()
    }

    /// Finalizes explicitly, returning the engine's code.
    pub fn finalize(self) -> c_int {
        let ptr = self.as_ptr();
        std::mem::forget(self);
        // SAFETY: ownership was taken from `self`, so this runs once.
        unsafe { sys::sqlite3_finalize(ptr) }
    }

    pub fn step(&self) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_step(self.as_ptr()) }
    }

    pub fn reset(&self) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_reset(self.as_ptr()) }
    }

    pub fn clear_bindings(&self) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_clear_bindings(self.as_ptr()) }
    }

    pub fn sql(&self) -> String {
        // SAFETY: live statement.
        owned_string(unsafe { sys::sqlite3_sql(self.as_ptr()) }).unwrap_or_default()
    }

    pub fn readonly(&self) -> bool {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_stmt_readonly(self.as_ptr()) != 0 }
    }

    // ── Parameter binding ───────────────────────────────────────────────

    pub fn bind_parameter_count(&self) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_bind_parameter_count(self.as_ptr()) }
    }

    /// 1-based index of a named parameter, 0 if unknown.
    pub fn bind_parameter_index(&self, name: &str) -> c_int {
        let Some(c_name) = c_string(name) else {
            return 0;
        };
        // SAFETY: live statement, valid C string.
        unsafe { sys::sqlite3_bind_parameter_index(self.as_ptr(), c_name.as_ptr()) }
    }

    pub fn bind_parameter_name(&self, idx: c_int) -> Option<String> {
        // SAFETY: live statement; out-of-range returns null.
        owned_string(unsafe { sys::sqlite3_bind_parameter_name(self.as_ptr(), idx) })
    }

    pub fn bind_null(&self, idx: c_int) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_bind_null(self.as_ptr(), idx) }
    }

    pub fn bind_int64(&self, idx: c_int, value: i64) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_bind_int64(self.as_ptr(), idx, value) }
    }

    pub fn bind_double(&self, idx: c_int, value: f64) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_bind_double(self.as_ptr(), idx, value) }
    }

    pub fn bind_text(&self, idx: c_int, value: &str) -> c_int {
        let Ok(len) = c_int::try_from(value.len()) else {
            return SQLITE_TOOBIG;
        };
        // SAFETY: SQLITE_TRANSIENT makes the engine copy `len` bytes now.
        unsafe {
            sys::sqlite3_bind_text(
                self.as_ptr(),
                idx,
                value.as_ptr().cast::<c_char>(),
                len,
                sys::SQLITE_TRANSIENT(),
            )
        }
    }

    pub fn bind_blob(&self, idx: c_int, value: &[u8]) -> c_int {
        let Ok(len) = c_int::try_from(value.len()) else {
            return SQLITE_TOOBIG;
        };
        if value.is_empty() {
            // A null pointer would bind NULL; keep it a zero-length blob.
            // SAFETY: live statement.
            return unsafe { sys::sqlite3_bind_zeroblob(self.as_ptr(), idx, 0) };
        }
        // SAFETY: SQLITE_TRANSIENT makes the engine copy `len` bytes now.
        unsafe {
            sys::sqlite3_bind_blob(
                self.as_ptr(),
                idx,
                value.as_ptr().cast::<c_void>(),
                len,
                sys::SQLITE_TRANSIENT(),
            )
        }
    }

    pub fn bind_zeroblob(&self, idx: c_int, len: c_int) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_bind_zeroblob(self.as_ptr(), idx, len) }
    }

    // ── Column reading ──────────────────────────────────────────────────

    pub fn column_count(&self) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_column_count(self.as_ptr()) }
    }

    pub fn data_count(&self) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_data_count(self.as_ptr()) }
    }

    pub fn column_name(&self, idx: c_int) -> Option<String> {
        // SAFETY: live statement; out-of-range returns null.
        owned_string(unsafe { sys::sqlite3_column_name(self.as_ptr(), idx) })
    }

    pub fn column_type(&self, idx: c_int) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_column_type(self.as_ptr(), idx) }
    }

    pub fn column_int64(&self, idx: c_int) -> i64 {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_column_int64(self.as_ptr(), idx) }
    }

    pub fn column_double(&self, idx: c_int) -> f64 {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_column_double(self.as_ptr(), idx) }
    }

    pub fn column_bytes(&self, idx: c_int) -> c_int {
        // SAFETY: live statement.
        unsafe { sys::sqlite3_column_bytes(self.as_ptr(), idx) }
    }

    /// Text of a column as raw UTF-8 bytes; length-delimited, so embedded
    /// NUL bytes survive.
    pub fn column_text(&self, idx: c_int) -> Vec<u8> {
        // SAFETY: column_text must precede column_bytes for the length to
        // describe the text representation.
        unsafe {
            let ptr = sys::sqlite3_column_text(self.as_ptr(), idx);
            let len = sys::sqlite3_column_bytes(self.as_ptr(), idx);
            copy_bytes(ptr.cast::<c_void>(), len)
        }
    }

    pub fn column_blob(&self, idx: c_int) -> Vec<u8> {
        // SAFETY: see `column_text`.
        unsafe {
            let ptr = sys::sqlite3_column_blob(self.as_ptr(), idx);
            let len = sys::sqlite3_column_bytes(self.as_ptr(), idx);
            copy_bytes(ptr, len)
        }
    }
}

impl Drop for RawStmt {
    fn drop(&mut self) {
        // SAFETY: finalize consumes via mem::forget, so this runs at most once.
        unsafe {
            sys::sqlite3_finalize(self.as_ptr());
        }
    }
}

// ── Blob handle ─────────────────────────────────────────────────────────

/// Owned `sqlite3_blob*`, closed on drop.
pub struct RawBlob {
    ptr: NonNull<sys::sqlite3_blob>,
}

// SAFETY: moved together with (and only used alongside) its connection.
unsafe impl Send for RawBlob {}

impl RawBlob {
    const fn as_ptr(&self) -> *mut sys::sqlite3_blob {
        self.ptr.as_ptr()
    }

    /// Closes explicitly, returning the engine's code.
    pub fn close(self) -> c_int {
        let ptr = self.as_ptr();
        std::mem::forget(self);
        // SAFETY: ownership was taken from `self`, so this runs once.
        unsafe { sys::sqlite3_blob_close(ptr) }
    }

    pub fn size(&self) -> c_int {
        // SAFETY: live blob.
        unsafe { sys::sqlite3_blob_bytes(self.as_ptr()) }
    }

    /// Reads `buf.len()` bytes at `offset`; the caller keeps the range
    /// inside the blob.
    pub fn read_at(&self, buf: &mut [u8], offset: c_int) -> c_int {
        let Ok(n) = c_int::try_from(buf.len()) else {
            return SQLITE_TOOBIG;
        };
        // SAFETY: `buf` is writable for `n` bytes.
        unsafe { sys::sqlite3_blob_read(self.as_ptr(), buf.as_mut_ptr().cast::<c_void>(), n, offset) }
    }

    /// Writes `buf` at `offset`; the caller keeps the range inside the blob.
    pub fn write_at(&self, buf: &[u8], offset: c_int) -> c_int {
        let Ok(n) = c_int::try_from(buf.len()) else {
            return SQLITE_TOOBIG;
        };
        // SAFETY: `buf` is readable for `n` bytes.
        unsafe { sys::sqlite3_blob_write(self.as_ptr(), buf.as_ptr().cast::<c_void>(), n, offset) }
    }

    pub fn reopen(&self, rowid: i64) -> c_int {
        // SAFETY: live blob.
        unsafe { sys::sqlite3_blob_reopen(self.as_ptr(), rowid) }
    }
}

impl Drop for RawBlob {
    fn drop(&mut self) {
        // SAFETY: close consumes via mem::forget, so this runs at most once.
        unsafe {
            sys::sqlite3_blob_close(self.as_ptr());
        }
    }
}

// ── Process-wide runtime ────────────────────────────────────────────────

pub fn initialize() -> c_int {
    // SAFETY: sqlite3_initialize is idempotent and thread-safe.
    unsafe { sys::sqlite3_initialize() }
}

pub fn shutdown() -> c_int {
    // SAFETY: the caller guarantees no connection is open.
    unsafe { sys::sqlite3_shutdown() }
}

pub fn memory_used() -> i64 {
    // SAFETY: pure query.
    unsafe { sys::sqlite3_memory_used() }
}

pub fn memory_highwater(reset: bool) -> i64 {
    // SAFETY: pure query.
    unsafe { sys::sqlite3_memory_highwater(c_int::from(reset)) }
}

pub fn libversion() -> String {
    // SAFETY: returns a static string.
    owned_string(unsafe { sys::sqlite3_libversion() }).unwrap_or_default()
}

pub fn libversion_number() -> c_int {
    // SAFETY: pure query.
    unsafe { sys::sqlite3_libversion_number() }
}
