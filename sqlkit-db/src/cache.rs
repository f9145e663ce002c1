//! Per-connection cache of persistent prepared statements.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::ffi::{self, RawStmt};
use crate::statement::Statement;

/// Idle compiled statements keyed by their SQL text.
#[derive(Default)]
pub(crate) struct StatementCache {
    idle: RefCell<HashMap<String, RawStmt>>,
}

impl StatementCache {
    pub(crate) fn take(&self, sql: &str) -> Option<RawStmt> {
        self.idle.borrow_mut().remove(sql)
    }

    /// Stores `raw` under `sql`. If the slot is taken, `raw` is handed back.
    pub(crate) fn put(&self, sql: String, raw: RawStmt) -> Option<RawStmt> {
        match self.idle.borrow_mut().entry(sql) {
            Entry::Vacant(slot) => {
                slot.insert(raw);
                None
            }
            Entry::Occupied(_) => Some(raw),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.idle.borrow().len()
    }

    /// Finalizes every idle statement.
    pub(crate) fn clear(&self) {
        self.idle.borrow_mut().clear();
    }
}

/// A statement checked out of its connection's cache by
/// [`Connection::prep`](crate::Connection::prep).
///
/// Dereferences to [`Statement`]. On drop the statement is reset, its
/// bindings are cleared and it returns to the cache; a statement whose reset
/// reports a fresh error is finalized instead.
pub struct CachedStatement<'conn> {
    stmt: Option<Statement<'conn>>,
    sql: String,
}

impl<'conn> CachedStatement<'conn> {
    pub(crate) fn new(stmt: Statement<'conn>, sql: &str) -> Self {
        Self {
            stmt: Some(stmt),
            sql: sql.to_string(),
        }
    }

    /// Finalizes the statement instead of returning it to the cache.
    pub fn discard(mut self) {
        drop(self.stmt.take());
    }
}

impl<'conn> Deref for CachedStatement<'conn> {
    type Target = Statement<'conn>;

    fn deref(&self) -> &Self::Target {
        self.stmt
            .as_ref()
            .unwrap_or_else(|| unreachable!("statement is only taken on drop"))
    }
}

impl DerefMut for CachedStatement<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stmt
            .as_mut()
            .unwrap_or_else(|| unreachable!("statement is only taken on drop"))
    }
}

impl Drop for CachedStatement<'_> {
    fn drop(&mut self) {
        let Some(mut stmt) = self.stmt.take() else {
            return;
        };
        let rc = stmt.rewind();
        if rc != ffi::SQLITE_OK {
            log::warn!(
                "finalizing cached statement {:?}: reset failed: {}",
                self.sql,
                ffi::errstr(rc)
            );
            return;
        }
        stmt.clear_bindings();
        let conn = stmt.connection();
        let (raw, _) = stmt.into_raw();
        if let Some(displaced) = conn.cache().put(std::mem::take(&mut self.sql), raw) {
            drop(displaced);
        }
    }
}

impl fmt::Debug for CachedStatement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedStatement")
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}
