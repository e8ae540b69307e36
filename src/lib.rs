#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

//! An embeddable, log-structured key/value store in the Bitcask lineage.
//!
//! Writes are appended to a sequence of bounded-size, immutable segment
//! files; an in-memory key directory maps every live key to the location of
//! its most recent value. Startup replay rebuilds that directory from the
//! segments on disk, and [`Engine::merge`] compacts multiple segments down
//! to a minimal set containing only live records.
//!
//! This crate covers the storage engine itself — the segment manager, the
//! record format, the key directory, replay, and merge. It deliberately
//! does not provide a process/CLI surface, multi-writer locking,
//! transactions, network framing, or a hint-file index; see each module's
//! documentation for the invariants it upholds.

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod keydir;
mod merge;
mod replay;
pub mod segment;

pub use config::Options;
pub use engine::Engine;
pub use error::{Error, Result};
pub use keydir::Locator;
