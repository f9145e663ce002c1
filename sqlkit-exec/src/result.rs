//! Single-value results.
//!
//! Each helper steps a prepared statement, requires exactly one row of one
//! column, reads it and resets the statement for reuse.

use sqlkit_db::Statement;

use crate::error::{ExecError, ExecResult};

fn single<T>(stmt: &mut Statement<'_>, read: impl FnOnce(&Statement<'_>) -> T) -> ExecResult<T> {
    let columns = stmt.column_count();
    if columns != 1 {
        return Err(ExecError::ColumnCount(columns));
    }
    if !stmt.step()?.is_row() {
        return Err(ExecError::NoRows);
    }
    let value = read(stmt);
    if stmt.step()?.is_row() {
        return Err(ExecError::ExtraRows);
    }
    Ok(value)
}

fn one<T>(stmt: &mut Statement<'_>, read: impl FnOnce(&Statement<'_>) -> T) -> ExecResult<T> {
    match single(stmt, read) {
        Ok(value) => {
            stmt.reset()?;
            Ok(value)
        }
        Err(err) => {
            // The first failure is the one reported; a fired interrupt also
            // fails the reset and leaves the statement Interrupted.
            if let Err(reset) = stmt.reset() {
                log::warn!("reset after failed single-result query: {reset}");
            }
            Err(err)
        }
    }
}

/// The single result as a 64-bit integer.
///
/// # Errors
///
/// [`ExecError::NoRows`], [`ExecError::ExtraRows`],
/// [`ExecError::ColumnCount`] or step failures.
pub fn result_int64(stmt: &mut Statement<'_>) -> ExecResult<i64> {
    one(stmt, |s| s.column_int64(0))
}

/// The single result as a 32-bit integer, truncating.
///
/// # Errors
///
/// As [`result_int64`].
pub fn result_int(stmt: &mut Statement<'_>) -> ExecResult<i32> {
    one(stmt, |s| s.column_int(0))
}

/// The single result as a float.
///
/// # Errors
///
/// As [`result_int64`].
pub fn result_float(stmt: &mut Statement<'_>) -> ExecResult<f64> {
    one(stmt, |s| s.column_float(0))
}

/// The single result as a boolean; any non-zero integer is true.
///
/// # Errors
///
/// As [`result_int64`].
pub fn result_bool(stmt: &mut Statement<'_>) -> ExecResult<bool> {
    one(stmt, |s| s.column_bool(0))
}

/// The single result as text.
///
/// # Errors
///
/// As [`result_int64`].
pub fn result_text(stmt: &mut Statement<'_>) -> ExecResult<String> {
    one(stmt, |s| s.column_text(0))
}
