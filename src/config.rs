//! Engine configuration.

use crate::error::{Error, Result};

/// Lower bound of [`Options::max_log_size`], inclusive.
pub const MIN_LOG_SIZE: u64 = 1024;
/// Upper bound of [`Options::max_log_size`], inclusive.
pub const MAX_LOG_SIZE: u64 = 16384;
/// Default [`Options::max_log_size`] when unspecified.
pub const DEFAULT_LOG_SIZE: u64 = 4096;

/// Options controlling how an [`crate::Engine`] manages its segment files.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Maximum size, in bytes, a segment may reach before it is sealed and a
    /// new active segment is opened. Must be in `[1024, 16384]`.
    pub max_log_size: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self { max_log_size: DEFAULT_LOG_SIZE }
    }
}

impl Options {
    /// Validates the options, returning [`Error::InvalidArgument`] if
    /// `max_log_size` is out of range.
    pub(crate) fn validate(&self) -> Result<()> {
        if !(MIN_LOG_SIZE..=MAX_LOG_SIZE).contains(&self.max_log_size) {
            return Err(Error::InvalidArgument(format!(
                "max_log_size must be between {MIN_LOG_SIZE} and {MAX_LOG_SIZE}, got {}",
                self.max_log_size
            )));
        }
        Ok(())
    }
}
