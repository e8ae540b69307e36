//! Compaction: rewrites live records into a fresh, minimal set of segments.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::keydir::{KeyDir, Locator};
use crate::segment::{segment_path, Segment, SegmentId};

/// The new on-disk state produced by a successful merge.
pub struct MergeOutcome {
    /// The fresh, empty active segment subsequent writes should target.
    pub active: Segment,
    /// Ids of the new sealed segments holding the rewritten live records, in
    /// ascending order.
    pub sealed: Vec<SegmentId>,
    /// Ids of the pre-merge segments that were unlinked.
    pub removed: Vec<SegmentId>,
}

/// Rewrites every live entry of `keydir` into a fresh sequence of segments
/// starting at `max(old_set) + 1`, then unlinks every pre-merge segment.
/// Basing the new ids on the maximum rather than the count of the old set
/// keeps ids monotonically increasing (S1) across repeated merges, where
/// the count of surviving segments can be far lower than the highest id
/// already used.
///
/// The caller must have already synced and dropped its handle on the active
/// segment (`active_id`) before calling this, per spec.md §4.6 step 1. The
/// caller is also responsible for invalidating any cached read handles for
/// segments named in `old_set` (returned via [`MergeOutcome::removed`])
/// before relying on this function having removed them.
pub fn merge(
    dir: &Path,
    max_log_size: u64,
    keydir: &mut KeyDir,
    sealed_ids: &[SegmentId],
    active_id: SegmentId,
) -> Result<MergeOutcome> {
    let old_set: Vec<SegmentId> = sealed_ids.iter().copied().chain(std::iter::once(active_id)).collect();
    let new_start_id = old_set.iter().max().map_or(0, |m| *m) + 1;

    let mut readers: HashMap<SegmentId, Segment> = HashMap::new();
    let entries: Vec<(Vec<u8>, Locator)> = keydir.entries().map(|(k, l)| (k.clone(), *l)).collect();

    let mut new_id = new_start_id;
    let mut new_seg = Segment::open_active(dir, new_id)?;
    let mut cursor = 0u64;
    let mut new_sealed = Vec::new();

    for (key, locator) in entries {
        if !readers.contains_key(&locator.segment_id) {
            readers.insert(locator.segment_id, Segment::open_readonly(dir, locator.segment_id)?);
        }
        let reader = readers.get_mut(&locator.segment_id).unwrap();
        let record = reader.read_at(locator.offset, locator.length)?;

        if cursor + record.len() as u64 > max_log_size {
            new_seg.sync()?;
            new_sealed.push(new_id);
            new_id += 1;
            new_seg = Segment::open_active(dir, new_id)?;
            cursor = 0;
        }

        let written = new_seg.append(&record)?;
        keydir.put(
            key,
            Locator { segment_id: new_id, offset: cursor, length: written as u32, timestamp: locator.timestamp },
        );
        cursor += written;
    }

    new_seg.sync()?;
    new_sealed.push(new_id);
    drop(readers);

    for id in &old_set {
        let path = segment_path(dir, *id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
    }

    let final_id = new_id + 1;
    let final_active = Segment::open_active(dir, final_id)?;

    log::info!(
        "merge rewrote {} live key(s) into {} segment(s), removed {} old segment(s)",
        keydir.len(),
        new_sealed.len(),
        old_set.len(),
    );

    Ok(MergeOutcome { active: final_active, sealed: new_sealed, removed: old_set })
}
