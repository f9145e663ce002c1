//! Running statements and scripts to completion.

use std::collections::BTreeSet;
use std::fmt;

use sqlkit_db::{Connection, Statement, Value};

use crate::error::{ExecError, ExecResult};
use crate::savepoint::Savepoint;

/// Callback invoked once per result row.
pub type RowFn<'a> = Box<dyn FnMut(&Statement<'_>) -> ExecResult<()> + 'a>;

/// Arguments and row handling for [`execute`] and friends.
///
/// ```
/// use sqlkit_db::Connection;
/// use sqlkit_exec::{execute, ExecOptions};
///
/// let conn = Connection::open_in_memory()?;
/// let mut total = 0;
/// execute(
///     &conn,
///     "SELECT ?1 + $two",
///     ExecOptions::new()
///         .arg(1)
///         .bind("$two", 2)
///         .on_row(|stmt| {
///             total = stmt.column_int64(0);
///             Ok(())
///         }),
/// )?;
/// assert_eq!(total, 3);
/// # Ok::<(), sqlkit_exec::ExecError>(())
/// ```
#[derive(Default)]
pub struct ExecOptions<'a> {
    /// Positional arguments, bound to `?1`, `?2`, ...
    pub args: Vec<Value>,
    /// Named arguments; names include their marker (`":id"`, `"$id"`).
    pub named: Vec<(String, Value)>,
    /// Called for every row produced.
    pub result_fn: Option<RowFn<'a>>,
}

impl<'a> ExecOptions<'a> {
    /// Options with no arguments and no row callback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Adds a named argument.
    #[must_use]
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.named.push((name.to_string(), value.into()));
        self
    }

    /// Sets the per-row callback.
    #[must_use]
    pub fn on_row(mut self, f: impl FnMut(&Statement<'_>) -> ExecResult<()> + 'a) -> Self {
        self.result_fn = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for ExecOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("args", &self.args)
            .field("named", &self.named)
            .field("result_fn", &self.result_fn.is_some())
            .finish()
    }
}

fn bind_all(stmt: &mut Statement<'_>, args: &[Value], named: &[(String, Value)]) {
    for (i, value) in args.iter().enumerate() {
        stmt.bind_value(i + 1, value);
    }
    for (name, value) in named {
        stmt.set_value(name, value);
    }
}

pub(crate) fn run(conn: &Connection, sql: &str) -> ExecResult<()> {
    let mut stmt = conn.prep(sql)?;
    stmt.step_to_end()?;
    Ok(())
}

fn drive(stmt: &mut Statement<'_>, mut result_fn: Option<&mut RowFn<'_>>) -> ExecResult<()> {
    while stmt.step()?.is_row() {
        if let Some(f) = result_fn.as_mut() {
            f(stmt)?;
        }
    }
    Ok(())
}

/// Runs `sql` through the connection's statement cache, binding the
/// arguments in `opts` and calling its row callback for every row.
///
/// # Errors
///
/// Returns prepare, bind and step failures, and whatever the row callback
/// returns.
pub fn execute(conn: &Connection, sql: &str, opts: ExecOptions<'_>) -> ExecResult<()> {
    let ExecOptions {
        args,
        named,
        mut result_fn,
    } = opts;
    let mut stmt = conn.prep(sql)?;
    bind_all(&mut stmt, &args, &named);
    drive(&mut stmt, result_fn.as_mut())
}

/// Like [`execute`], but compiles `sql` afresh and finalizes it afterwards.
///
/// # Errors
///
/// As [`execute`]; content after the first statement is also an error.
pub fn execute_transient(conn: &Connection, sql: &str, opts: ExecOptions<'_>) -> ExecResult<()> {
    let ExecOptions {
        args,
        named,
        mut result_fn,
    } = opts;
    let mut stmt = conn.prepare(sql)?;
    bind_all(&mut stmt, &args, &named);
    drive(&mut stmt, result_fn.as_mut())?;
    stmt.finalize()?;
    Ok(())
}

/// Runs every statement of `script` inside a savepoint.
///
/// Named arguments are bound to each statement that declares them; one that
/// no statement declares is an error. The first error rolls the whole script
/// back.
///
/// # Errors
///
/// [`ExecError::PositionalArgs`] if `opts` carries positional arguments,
/// otherwise the first failure of any statement.
pub fn execute_script(conn: &Connection, script: &str, opts: ExecOptions<'_>) -> ExecResult<()> {
    let ExecOptions {
        args,
        named,
        mut result_fn,
    } = opts;
    if !args.is_empty() {
        return Err(ExecError::PositionalArgs);
    }
    let savepoint = Savepoint::named(conn, "execute_script")?;
    let mut unused: BTreeSet<&str> = named.iter().map(|(name, _)| name.as_str()).collect();
    let mut rest = script;
    while let Some((mut stmt, trailing)) = conn.prepare_next(rest)? {
        for (name, value) in &named {
            if stmt.bind_param_index(name).is_some() {
                stmt.set_value(name, value);
                unused.remove(name.as_str());
            }
        }
        drive(&mut stmt, result_fn.as_mut())?;
        stmt.finalize()?;
        rest = rest.get(rest.len() - trailing..).unwrap_or_default();
    }
    if let Some(name) = unused.first() {
        return Err(ExecError::UnusedArgument((*name).to_string()));
    }
    savepoint.release()
}

/// [`execute_script`] without arguments or row callback.
///
/// # Errors
///
/// As [`execute_script`].
pub fn exec_script(conn: &Connection, script: &str) -> ExecResult<()> {
    execute_script(conn, script, ExecOptions::default())
}
