//! Segment files: append-only, bounded-size chunks of the log.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Identifies a segment within a database directory. Ids are assigned in
/// monotonically increasing order; the active segment always holds the
/// highest id (invariant S1).
pub type SegmentId = u64;

/// Returns the file name for a given segment id: `NNNNN.dat`, zero-padded to
/// 5 decimal digits (widening naturally for ids beyond 99999).
pub fn segment_file_name(id: SegmentId) -> String {
    format!("{id:05}.dat")
}

/// Returns the full path of a segment file within `dir`.
pub fn segment_path(dir: &Path, id: SegmentId) -> PathBuf {
    dir.join(segment_file_name(id))
}

fn segment_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{5,})\.dat$").unwrap())
}

/// Parses a directory entry's file name as a segment id, returning `None` if
/// it does not match the segment-name pattern. Files that don't match are
/// ignored by [`crate::Engine::open`], per spec.md §6.
pub fn parse_segment_id(file_name: &str) -> Option<SegmentId> {
    segment_name_re().captures(file_name)?.get(1)?.as_str().parse().ok()
}

/// Lists the ids of every segment file found directly in `dir`, sorted
/// ascending. Non-matching entries are silently ignored.
pub fn list_segment_ids(dir: &Path) -> Result<Vec<SegmentId>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if let Some(id) = parse_segment_id(name) {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// A handle over one segment file. Used both for the writable active segment
/// and for read-only access to sealed segments.
#[derive(Debug)]
pub struct Segment {
    id: SegmentId,
    path: PathBuf,
    file: File,
    len: u64,
}

impl Segment {
    /// Opens (creating if necessary) the segment `id` in `dir` for both
    /// reading and writing. The engine tracks its own write cursor rather
    /// than relying on O_APPEND semantics, so that the same handle can
    /// satisfy both `append` and `read_at` (spec.md §5: "the active segment
    /// may be read through the same handle that writes it").
    pub fn open_active(dir: &Path, id: SegmentId) -> Result<Self> {
        let path = segment_path(dir, id);
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self { id, path, file, len })
    }

    /// Opens the segment `id` in `dir` read-only. Used for sealed segments
    /// reopened on demand for point lookups.
    pub fn open_readonly(dir: &Path, id: SegmentId) -> Result<Self> {
        let path = segment_path(dir, id);
        let file = OpenOptions::new().read(true).open(&path)?;
        let len = file.metadata()?.len();
        Ok(Self { id, path, file, len })
    }

    /// The id of this segment.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// The path of this segment's file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current length of the segment file.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Appends `bytes` to the end of the segment in a single `write_all`
    /// call and returns the number of bytes written.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(bytes)?;
        self.len += bytes.len() as u64;
        Ok(bytes.len() as u64)
    }

    /// Reads exactly `length` bytes starting at `offset`.
    pub fn read_at(&mut self, offset: u64, length: u32) -> Result<Vec<u8>> {
        if offset + length as u64 > self.len {
            return Err(Error::InternalConsistency(format!(
                "segment {} has length {} but read requested [{}, {})",
                self.id,
                self.len,
                offset,
                offset + length as u64
            )));
        }
        let mut buf = vec![0u8; length as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Forces a durable flush of the segment file. Skipped under test builds
    /// to keep the scripted and property test suites fast, matching the
    /// teacher's `BitCask::flush`.
    pub fn sync(&self) -> Result<()> {
        #[cfg(not(test))]
        self.file.sync_all()?;
        Ok(())
    }
}
