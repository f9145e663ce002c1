//! Process-wide engine lifecycle and accounting.
//!
//! Opening a connection initializes the engine implicitly; [`initialize`]
//! exists for hosts that want initialization failures reported up front.
//! [`shutdown`] releases every global resource and must only run once all
//! connections are closed.

use crate::code::ResultCode;
use crate::error::{DbError, DbResult, ErrorKind};
use crate::ffi;

fn check(rc: i32) -> DbResult<()> {
    if rc == ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(DbError::new(
            ErrorKind::Config,
            ResultCode::from_code(rc),
            ffi::errstr(rc),
        ))
    }
}

/// Initializes the engine. Later calls are no-ops.
///
/// # Errors
///
/// Returns the engine's error if initialization fails.
pub fn initialize() -> DbResult<()> {
    check(ffi::initialize())
}

/// Deinitializes the engine. A later [`initialize`] (or open) starts it
/// again.
///
/// # Errors
///
/// Returns the engine's error if shutdown fails.
pub fn shutdown() -> DbResult<()> {
    log::debug!("shutting down engine");
    check(ffi::shutdown())
}

/// Bytes of memory currently allocated by the engine.
#[must_use]
pub fn memory_used() -> i64 {
    ffi::memory_used()
}

/// Peak of [`memory_used`] since the last reset; `reset` starts a new
/// window at the current level.
#[must_use]
pub fn memory_highwater(reset: bool) -> i64 {
    ffi::memory_highwater(reset)
}

/// Engine version string, e.g. `"3.46.0"`.
#[must_use]
pub fn version() -> String {
    ffi::libversion()
}

/// Engine version number, e.g. `3046000`.
#[must_use]
pub fn version_number() -> i32 {
    ffi::libversion_number()
}
