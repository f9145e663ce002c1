//! Incremental I/O on a single text or blob value.
//!
//! A [`Blob`] is a cursor over one column of one row, opened with
//! [`Connection::open_blob`]. It implements [`Read`], [`Write`] and [`Seek`];
//! engine failures surface as [`io::Error`]s wrapping a [`DbError`], which
//! [`DbError::from_io`] recovers.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::raw::c_int;

use crate::code::ResultCode;
use crate::connection::Connection;
use crate::error::{DbError, DbResult, ErrorKind};
use crate::ffi::{self, RawBlob};
use crate::statement::LiveGuard;

/// An open handle on one value, readable and optionally writable.
///
/// The value's size is fixed: writes never grow it. Closed when dropped or
/// by [`close`](Self::close).
pub struct Blob<'conn> {
    conn: &'conn Connection,
    raw: RawBlob,
    len: usize,
    pos: usize,
    writable: bool,
    _live: LiveGuard<'conn>,
}

impl<'conn> Blob<'conn> {
    pub(crate) fn new(conn: &'conn Connection, raw: RawBlob, writable: bool) -> Self {
        let len = usize::try_from(raw.size()).unwrap_or(0);
        Self {
            conn,
            raw,
            len,
            pos: 0,
            writable,
            _live: LiveGuard::new(conn.live_blobs()),
        }
    }

    /// Size of the value in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the value is zero bytes long.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current cursor offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Whether the blob was opened for writing.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    /// Points the handle at the same column of another row and rewinds.
    ///
    /// # Errors
    ///
    /// Fails if the row does not exist or holds no text or blob; the handle
    /// is unusable afterwards.
    pub fn reopen(&mut self, rowid: i64) -> DbResult<()> {
        self.conn.check_interrupt(ErrorKind::Blob)?;
        match self.raw.reopen(rowid) {
            ffi::SQLITE_OK => {
                self.len = usize::try_from(self.raw.size()).unwrap_or(0);
                self.pos = 0;
                Ok(())
            }
            rc => Err(self.conn.error(ErrorKind::Blob, rc)),
        }
    }

    /// Closes the handle.
    ///
    /// # Errors
    ///
    /// Returns the engine's error, for example when a write could not be
    /// committed.
    pub fn close(self) -> DbResult<()> {
        let Self { conn, raw, .. } = self;
        match raw.close() {
            ffi::SQLITE_OK => Ok(()),
            rc => Err(conn.error(ErrorKind::Blob, rc)),
        }
    }

    fn offset(&self) -> io::Result<c_int> {
        c_int::try_from(self.pos).map_err(|_| {
            DbError::new(ErrorKind::Blob, ResultCode::TooBig, "offset out of range").into()
        })
    }
}

impl Read for Blob<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.conn.check_interrupt(ErrorKind::Blob)?;
        let n = buf.len().min(self.len.saturating_sub(self.pos));
        if n == 0 {
            return Ok(0);
        }
        match self.raw.read_at(&mut buf[..n], self.offset()?) {
            ffi::SQLITE_OK => {
                self.pos += n;
                Ok(n)
            }
            rc => Err(self.conn.error(ErrorKind::Blob, rc).into()),
        }
    }
}

impl Write for Blob<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.conn.check_interrupt(ErrorKind::Blob)?;
        if !self.writable {
            return Err(
                DbError::new(ErrorKind::Blob, ResultCode::ReadOnly, "blob opened read-only").into(),
            );
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min(self.len.saturating_sub(self.pos));
        if n == 0 {
            return Err(DbError::new(
                ErrorKind::Blob,
                ResultCode::Error,
                format!("write past end of {}-byte blob", self.len),
            )
            .into());
        }
        match self.raw.write_at(&buf[..n], self.offset()?) {
            ffi::SQLITE_OK => {
                self.pos += n;
                Ok(n)
            }
            rc => Err(self.conn.error(ErrorKind::Blob, rc).into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for Blob<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => (0, i128::from(offset)),
            SeekFrom::End(delta) => (self.len, i128::from(delta)),
            SeekFrom::Current(delta) => (self.pos, i128::from(delta)),
        };
        let target = i128::try_from(base).unwrap_or(i128::MAX) + delta;
        let target = usize::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        self.pos = target;
        Ok(target as u64)
    }
}

impl fmt::Debug for Blob<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("len", &self.len)
            .field("pos", &self.pos)
            .field("writable", &self.writable)
            .finish_non_exhaustive()
    }
}
