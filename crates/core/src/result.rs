//! Result type definition and tap-style combinators.
//!
//! Lets callers attach logging or bookkeeping to a `Result` without breaking
//! a `?` chain and without unwrap/expect.

use crate::error::Error;

/// The standard Result type for metasync core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Tap-style combinators for any `Result`.
pub trait ResultExt<T, E> {
    /// Perform a side effect on the Ok value without consuming the Result.
    #[must_use]
    fn tap_ok<F: FnOnce(&T)>(self, f: F) -> Self;

    /// Perform a side effect on the Err value without consuming the Result.
    #[must_use]
    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E> {
    fn tap_ok<F: FnOnce(&T)>(self, f: F) -> Self {
        if let Ok(ref v) = self {
            f(v);
        }
        self
    }

    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }
}
