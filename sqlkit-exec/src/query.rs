//! Row-mapping query helpers.

use sqlkit_db::{Connection, DbResult, Statement, Value};

use crate::error::{ExecError, ExecResult};

/// Runs `sql` with positional `params` and maps its first row.
///
/// # Errors
///
/// [`ExecError::NoRows`] if the query produces no row, otherwise prepare,
/// bind, step and mapper failures.
pub fn query_row<T>(
    conn: &Connection,
    sql: &str,
    params: &[Value],
    mapper: impl FnOnce(&Statement<'_>) -> DbResult<T>,
) -> ExecResult<T> {
    query_row_optional(conn, sql, params, mapper)?.ok_or(ExecError::NoRows)
}

/// Like [`query_row`], but an empty result is `Ok(None)`.
///
/// # Errors
///
/// Prepare, bind, step and mapper failures.
pub fn query_row_optional<T>(
    conn: &Connection,
    sql: &str,
    params: &[Value],
    mapper: impl FnOnce(&Statement<'_>) -> DbResult<T>,
) -> ExecResult<Option<T>> {
    let mut stmt = conn.prep(sql)?;
    stmt.bind_values(params)?;
    if stmt.step()?.is_row() {
        Ok(Some(mapper(&stmt)?))
    } else {
        Ok(None)
    }
}

/// Runs `sql` with positional `params` and maps every row.
///
/// # Errors
///
/// Prepare, bind, step and mapper failures.
pub fn query_map<T>(
    conn: &Connection,
    sql: &str,
    params: &[Value],
    mut mapper: impl FnMut(&Statement<'_>) -> DbResult<T>,
) -> ExecResult<Vec<T>> {
    let mut stmt = conn.prep(sql)?;
    stmt.bind_values(params)?;
    let mut rows = Vec::new();
    while stmt.step()?.is_row() {
        rows.push(mapper(&stmt)?);
    }
    Ok(rows)
}
