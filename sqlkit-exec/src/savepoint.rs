//! Savepoint guard.

use log::warn;
use sqlkit_db::Connection;

use crate::error::ExecResult;
use crate::exec::run;

/// An open savepoint.
///
/// Dropping the guard without calling [`Savepoint::release`] rolls back
/// everything done since [`save`], even if the connection has been
/// interrupted in the meantime.
pub struct Savepoint<'conn> {
    conn: &'conn Connection,
    name: String,
    done: bool,
}

/// Opens a savepoint with a generic name.
///
/// # Errors
///
/// Fails if the `SAVEPOINT` statement itself fails, for example because the
/// connection is interrupted.
pub fn save(conn: &Connection) -> ExecResult<Savepoint<'_>> {
    Savepoint::named(conn, "sqlkit")
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl<'conn> Savepoint<'conn> {
    /// Opens a savepoint called `name`. Nested savepoints may share a name.
    ///
    /// # Errors
    ///
    /// Fails if the `SAVEPOINT` statement fails.
    pub fn named(conn: &'conn Connection, name: &str) -> ExecResult<Self> {
        let name = quote(name);
        run(conn, &format!("SAVEPOINT {name};"))?;
        Ok(Self {
            conn,
            name,
            done: false,
        })
    }

    /// The connection the savepoint was opened on.
    #[must_use]
    pub const fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Keeps the changes made since the savepoint was opened.
    ///
    /// # Errors
    ///
    /// Fails if `RELEASE` fails. The changes are then rolled back when the
    /// guard drops.
    pub fn release(mut self) -> ExecResult<()> {
        run(self.conn, &format!("RELEASE {};", self.name))?;
        self.done = true;
        Ok(())
    }

    /// Discards the changes made since the savepoint was opened.
    ///
    /// # Errors
    ///
    /// Fails if the rollback statements fail.
    pub fn rollback(mut self) -> ExecResult<()> {
        self.done = true;
        self.undo()
    }

    fn undo(&self) -> ExecResult<()> {
        let signal = self.conn.set_interrupt(None);
        let result = run(self.conn, &format!("ROLLBACK TO {};", self.name))
            .and_then(|()| run(self.conn, &format!("RELEASE {};", self.name)));
        self.conn.set_interrupt(signal);
        result
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if !self.done {
            if let Err(err) = self.undo() {
                warn!("rollback of savepoint {} failed: {err}", self.name);
            }
        }
    }
}

impl std::fmt::Debug for Savepoint<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Savepoint")
            .field("name", &self.name)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
