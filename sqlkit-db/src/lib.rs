//! Safe `SQLite` binding over the engine's C ABI.
//!
//! The raw symbols come from `libsqlite3-sys`, built from its bundled
//! amalgamation. Consumer code uses only the safe types defined here: a
//! [`Connection`] owns one native handle; [`Statement`]s, [`CachedStatement`]s
//! and [`Blob`]s borrow it, so none of them can outlive it and each is
//! released exactly once. The `ffi` module is the **only** file that
//! contains `unsafe` code or C types.
//!
//! Blocking engine calls run on the caller's thread. Lock contention is
//! retried according to the connection's [`BusyPolicy`], and an installed
//! [`InterruptSignal`] cancels in-flight and future calls from any thread.
//!
//! ```
//! use sqlkit_db::{Connection, StepResult};
//!
//! let conn = Connection::open_in_memory()?;
//! let mut stmt = conn.prepare("SELECT $greeting || ', World!' AS msg")?;
//! stmt.set_text("$greeting", "Hello");
//! assert_eq!(stmt.step()?, StepResult::Row);
//! assert_eq!(stmt.get_text("msg"), "Hello, World!");
//! # Ok::<(), sqlkit_db::DbError>(())
//! ```

mod ffi;

mod blob;
mod busy;
mod cache;
pub mod code;
mod config;
mod connection;
pub mod error;
mod interrupt;
pub mod runtime;
mod statement;
pub mod value;

pub use blob::Blob;
pub use busy::{BusyPolicy, DEFAULT_BUSY_TIMEOUT};
pub use cache::CachedStatement;
pub use code::ResultCode;
pub use config::{Limit, LimitSetting, OpenFlags, OpenOptions};
pub use connection::Connection;
pub use error::{DbError, DbResult, ErrorKind, Position};
pub use interrupt::InterruptSignal;
pub use statement::{Statement, StatementState, StepResult};
pub use value::{ColumnType, Value};

#[cfg(test)]
mod tests;
