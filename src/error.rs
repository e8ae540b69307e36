//! Error types returned by the storage engine.

use std::fmt;

/// Errors that the engine distinguishes.
///
/// There is no separate "not found" variant: lookups that simply miss return
/// `Ok(None)`, reserving `Error` for conditions the caller cannot treat as
/// routine control flow.
#[derive(Debug)]
pub enum Error {
    /// A configuration value was outside its valid range.
    InvalidArgument(String),
    /// An underlying filesystem operation failed.
    Io(std::io::Error),
    /// A locator or decoded header was inconsistent with what is on disk.
    ///
    /// This indicates corruption or a bug; recovery is not attempted.
    InternalConsistency(String),
    /// The engine has been closed and can no longer be used.
    Closed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::Io(err) => write!(f, "I/O error: {err}"),
            Error::InternalConsistency(msg) => write!(f, "internal consistency error: {msg}"),
            Error::Closed => write!(f, "engine is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
