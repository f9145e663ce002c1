//! Execution helpers for `sqlkit-db`.
//!
//! Everything here is built on the public API of [`sqlkit_db`]: running
//! statements and scripts to completion with per-row callbacks, reading
//! single-value results, mapping rows, and scoped savepoints and
//! transactions that roll back when dropped.
//!
//! ```
//! use sqlkit_db::Connection;
//! use sqlkit_exec::{exec_script, result_int64};
//!
//! let conn = Connection::open_in_memory()?;
//! exec_script(
//!     &conn,
//!     "CREATE TABLE t (c INTEGER);
//!      INSERT INTO t (c) VALUES (1), (2), (3);",
//! )?;
//! let mut stmt = conn.prep("SELECT sum(c) FROM t;")?;
//! assert_eq!(result_int64(&mut stmt)?, 6);
//! # Ok::<(), sqlkit_exec::ExecError>(())
//! ```

mod error;
mod exec;
mod query;
mod result;
mod savepoint;
mod transaction;

pub use error::{ExecError, ExecResult};
pub use exec::{exec_script, execute, execute_script, execute_transient, ExecOptions, RowFn};
pub use query::{query_map, query_row, query_row_optional};
pub use result::{result_bool, result_float, result_int, result_int64, result_text};
pub use savepoint::{save, Savepoint};
pub use transaction::{Transaction, TransactionBehavior};
