//! Transaction guard.

use log::warn;
use sqlkit_db::{CachedStatement, Connection, DbResult, Statement, Value};

use crate::error::ExecResult;
use crate::exec::{execute, run, ExecOptions};

/// Transaction locking behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionBehavior {
    /// `BEGIN DEFERRED` (the default).
    #[default]
    Deferred,
    /// `BEGIN IMMEDIATE` – acquires a RESERVED lock immediately.
    Immediate,
    /// `BEGIN EXCLUSIVE` – no other connection may read or write.
    Exclusive,
}

impl TransactionBehavior {
    const fn begin_sql(self) -> &'static str {
        match self {
            Self::Deferred => "BEGIN DEFERRED;",
            Self::Immediate => "BEGIN IMMEDIATE;",
            Self::Exclusive => "BEGIN EXCLUSIVE;",
        }
    }
}

/// An open database transaction.
///
/// Automatically rolls back on drop unless explicitly committed.
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    finished: bool,
}

impl<'conn> Transaction<'conn> {
    /// Begins a new transaction on `conn`.
    ///
    /// # Errors
    ///
    /// Fails if `BEGIN` fails, for example inside another transaction.
    pub fn begin(conn: &'conn Connection, behavior: TransactionBehavior) -> ExecResult<Self> {
        run(conn, behavior.begin_sql())?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Fails if `COMMIT` fails; the transaction is then rolled back on drop.
    pub fn commit(mut self) -> ExecResult<()> {
        run(self.conn, "COMMIT;")?;
        self.finished = true;
        Ok(())
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// Fails if `ROLLBACK` fails.
    pub fn rollback(mut self) -> ExecResult<()> {
        self.finished = true;
        self.undo()
    }

    fn undo(&self) -> ExecResult<()> {
        if self.conn.autocommit() {
            // The engine already rolled back, e.g. after a constraint abort.
            return Ok(());
        }
        let signal = self.conn.set_interrupt(None);
        let result = run(self.conn, "ROLLBACK;");
        self.conn.set_interrupt(signal);
        result
    }

    /// The connection the transaction runs on.
    #[must_use]
    pub const fn connection(&self) -> &'conn Connection {
        self.conn
    }

    // ── Delegated helpers ───────────────────────────────────────────────

    /// See [`execute`].
    ///
    /// # Errors
    ///
    /// As [`execute`].
    pub fn execute(&self, sql: &str, opts: ExecOptions<'_>) -> ExecResult<()> {
        execute(self.conn, sql, opts)
    }

    /// See [`crate::exec_script`].
    ///
    /// # Errors
    ///
    /// As [`crate::exec_script`].
    pub fn exec_script(&self, script: &str) -> ExecResult<()> {
        crate::exec_script(self.conn, script)
    }

    /// See [`crate::query_row`].
    ///
    /// # Errors
    ///
    /// As [`crate::query_row`].
    pub fn query_row<T>(
        &self,
        sql: &str,
        params: &[Value],
        mapper: impl FnOnce(&Statement<'_>) -> DbResult<T>,
    ) -> ExecResult<T> {
        crate::query_row(self.conn, sql, params, mapper)
    }

    /// See [`Connection::prep`].
    ///
    /// # Errors
    ///
    /// As [`Connection::prep`].
    pub fn prep(&self, sql: &str) -> DbResult<CachedStatement<'conn>> {
        self.conn.prep(sql)
    }

    /// See [`Connection::last_insert_rowid`].
    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// See [`Connection::changes`].
    #[must_use]
    pub fn changes(&self) -> usize {
        self.conn.changes()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.undo() {
                warn!("transaction rollback failed: {err}");
            }
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
