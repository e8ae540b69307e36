//! The public façade: the append-only, single-writer key/value engine.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fs4::FileExt;

use crate::codec::{self, TOMBSTONE};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::keydir::{KeyDir, Locator};
use crate::merge;
use crate::replay;
use crate::segment::{self, Segment, SegmentId};

const LOCK_FILE_NAME: &str = ".lock";

/// An embedded, log-structured key/value store.
///
/// `Engine` is not `Send`/`Sync`: it assumes single-threaded, single-writer
/// use, as spec.md §5 requires. An embedder targeting a multithreaded host
/// must wrap it in its own lock (e.g. `std::sync::Mutex<Engine>`).
pub struct Engine {
    dir: PathBuf,
    max_log_size: u64,
    active: Segment,
    sealed: Vec<SegmentId>,
    keydir: KeyDir,
    cursor: u64,
    readers: HashMap<SegmentId, Segment>,
    lock_file: File,
    closed: bool,
}

impl Engine {
    /// Opens (creating if necessary) a database directory, replaying every
    /// existing segment to rebuild the key directory, then opens a fresh
    /// active segment for subsequent writes.
    pub fn open(dir: impl AsRef<Path>, options: Options) -> Result<Self> {
        options.validate()?;
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let lock_file = acquire_lock(&dir)?;

        let segment_ids = segment::list_segment_ids(&dir)?;
        log::info!("opening database {} ({} existing segment(s))", dir.display(), segment_ids.len());
        let keydir = replay::replay(&dir, &segment_ids, options.max_log_size)?;

        let active_id = segment_ids.iter().max().map_or(0, |m| *m) + 1;
        let active = Segment::open_active(&dir, active_id)?;

        Ok(Self {
            dir,
            max_log_size: options.max_log_size,
            active,
            sealed: segment_ids,
            keydir,
            cursor: 0,
            readers: HashMap::new(),
            lock_file,
            closed: false,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Seals the active segment and opens a new one if appending
    /// `additional_len` more bytes would exceed `max_log_size` (invariant
    /// S3). Rollover happens before the append, never after.
    fn rollover_if_needed(&mut self, additional_len: u64) -> Result<()> {
        if self.cursor + additional_len <= self.max_log_size {
            return Ok(());
        }
        self.active.sync()?;
        let sealed_id = self.active.id();
        let new_id = sealed_id + 1;
        log::debug!("sealing segment {sealed_id}, rolling over to segment {new_id}");
        let new_active = Segment::open_active(&self.dir, new_id)?;
        self.sealed.push(sealed_id);
        self.active = new_active;
        self.cursor = 0;
        Ok(())
    }

    /// Appends one record (a live value, or a tombstone) for `key`,
    /// rolling over the active segment first if necessary. Returns the
    /// locator of the freshly written record. State is only mutated once
    /// the write and its durable flush both succeed.
    fn append_record(&mut self, key: &[u8], value: &[u8]) -> Result<Locator> {
        let timestamp = now_millis();
        let encoded = codec::encode_kv(timestamp, key, value);
        self.rollover_if_needed(encoded.len() as u64)?;

        let offset = self.cursor;
        let written = self.active.append(&encoded)?;
        self.active.sync()?;
        self.cursor += written;

        Ok(Locator { segment_id: self.active.id(), offset, length: written as u32, timestamp })
    }

    /// Sets `key` to `value`, overwriting any existing value.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_open()?;
        let locator = self.append_record(key, value)?;
        self.keydir.put(key.to_vec(), locator);
        Ok(())
    }

    /// Looks up `key`, returning its value if live.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        let Some(&locator) = self.keydir.get(key) else {
            return Ok(None);
        };
        let raw = self.read_record(&locator)?;
        let (_, _, value) = codec::decode_kv(&raw);
        Ok(Some(value.to_vec()))
    }

    /// Reads the raw record bytes for `locator`, through the active
    /// segment's own handle if it targets the active segment, or through an
    /// on-demand, cached read-only handle otherwise.
    fn read_record(&mut self, locator: &Locator) -> Result<Vec<u8>> {
        if locator.segment_id == self.active.id() {
            return self.active.read_at(locator.offset, locator.length);
        }
        if !self.readers.contains_key(&locator.segment_id) {
            let reader = Segment::open_readonly(&self.dir, locator.segment_id)?;
            self.readers.insert(locator.segment_id, reader);
        }
        self.readers.get_mut(&locator.segment_id).unwrap().read_at(locator.offset, locator.length)
    }

    /// Deletes `key`. Writes a tombstone record regardless of whether `key`
    /// is currently live (idempotent on disk); removing a key that was
    /// never live is a no-op in the key directory.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.check_open()?;
        self.append_record(key, TOMBSTONE)?;
        self.keydir.delete(key);
        Ok(())
    }

    /// Returns every live key, in insertion order (K3).
    pub fn list_keys(&self) -> Result<Vec<Vec<u8>>> {
        self.check_open()?;
        Ok(self.keydir.keys().cloned().collect())
    }

    /// Invokes `callback(key, value)` for every live key, in insertion
    /// order. `callback` must not mutate the engine.
    pub fn fold<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]),
    {
        self.check_open()?;
        let locators: Vec<(Vec<u8>, Locator)> = self.keydir.entries().map(|(k, l)| (k.clone(), *l)).collect();
        for (key, locator) in locators {
            let raw = self.read_record(&locator)?;
            let (_, _, value) = codec::decode_kv(&raw);
            callback(&key, value);
        }
        Ok(())
    }

    /// Forces a durable flush of the active segment. A no-op in steady
    /// state, since `set`/`delete` already sync after every write.
    pub fn sync(&mut self) -> Result<()> {
        self.check_open()?;
        self.active.sync()
    }

    /// Compacts the database: rewrites every live record into a fresh,
    /// minimal sequence of segments and removes the segments that existed
    /// before the merge began.
    pub fn merge(&mut self) -> Result<()> {
        self.check_open()?;
        self.active.sync()?;
        let active_id = self.active.id();

        let outcome = merge::merge(&self.dir, self.max_log_size, &mut self.keydir, &self.sealed, active_id)?;

        for id in &outcome.removed {
            self.readers.remove(id);
        }

        self.active = outcome.active;
        self.sealed = outcome.sealed;
        self.cursor = 0;
        Ok(())
    }

    /// Closes the engine. Flushes the active segment, drops all open file
    /// handles and the key directory, and releases the single-writer lock.
    /// Any subsequent operation returns [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.active.sync()?;
        self.readers.clear();
        self.keydir = KeyDir::new();
        FileExt::unlock(&self.lock_file)?;
        self.closed = true;
        Ok(())
    }
}

fn acquire_lock(dir: &Path) -> Result<File> {
    let path = dir.join(LOCK_FILE_NAME);
    let file = std::fs::OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
    file.try_lock_exclusive()?;
    Ok(file)
}

fn now_millis() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64() * 1000.0
}

/// Attempt to flush and release the lock when the engine is dropped without
/// an explicit `close()`, matching the teacher's `impl Drop for BitCask`.
impl Drop for Engine {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(error) = self.close() {
                log::error!("failed to close database cleanly: {error}");
            }
        }
    }
}
