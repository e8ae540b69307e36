//! The in-memory key directory: a mapping from key to the on-disk location
//! of its most recent live value.

use indexmap::IndexMap;

use crate::segment::SegmentId;

/// Identifies exactly where one record lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    /// The segment containing the record.
    pub segment_id: SegmentId,
    /// Byte offset of the record's header within the segment.
    pub offset: u64,
    /// Full on-disk length of the record (header + key + value).
    pub length: u32,
    /// The record's write timestamp, in milliseconds since the epoch.
    pub timestamp: f64,
}

/// Maps live keys to their [`Locator`].
///
/// Iteration order is the insertion order of each surviving key's *first*
/// entry into the directory during the current session (invariant K3) — not
/// key order. This rules out `BTreeMap`, which the teacher's single-file
/// variant uses for its (out of scope here) range-scan support; an
/// `IndexMap` is the natural fit for an insertion-ordered map with O(1)
/// lookup.
#[derive(Debug, Default)]
pub struct KeyDir {
    entries: IndexMap<Vec<u8>, Locator>,
}

impl KeyDir {
    /// Creates an empty key directory.
    pub fn new() -> Self {
        Self { entries: IndexMap::new() }
    }

    /// Inserts or overwrites the locator for `key`. If `key` already has an
    /// entry, its position in iteration order is left unchanged.
    pub fn put(&mut self, key: Vec<u8>, locator: Locator) {
        self.entries.insert(key, locator);
    }

    /// Removes `key` from the directory, if present.
    ///
    /// Uses `shift_remove` rather than `swap_remove` so the relative order
    /// of the remaining keys is preserved, per K3.
    pub fn delete(&mut self, key: &[u8]) -> Option<Locator> {
        self.entries.shift_remove(key)
    }

    /// Looks up the locator for `key`.
    pub fn get(&self, key: &[u8]) -> Option<&Locator> {
        self.entries.get(key)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates live keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.entries.keys()
    }

    /// Iterates `(key, locator)` pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&Vec<u8>, &Locator)> {
        self.entries.iter()
    }
}
