//! Startup replay: rebuilds the key directory by scanning existing segments.

use std::io::Read;
use std::path::Path;

use crate::codec::{self, HEADER_SIZE};
use crate::error::Result;
use crate::keydir::{KeyDir, Locator};
use crate::segment::{segment_path, SegmentId};

/// Scans every segment in `segment_ids` (which must already be sorted
/// ascending) and rebuilds the key directory from scratch.
///
/// Because segments are processed in ascending id order and records within a
/// segment are processed in file order, the final directory reflects
/// last-write-wins for every key (invariants K1, K2).
pub fn replay(dir: &Path, segment_ids: &[SegmentId], max_log_size: u64) -> Result<KeyDir> {
    let mut keydir = KeyDir::new();
    for &id in segment_ids {
        replay_segment(dir, id, max_log_size, &mut keydir)?;
    }
    log::info!(
        "indexed {} live key(s) across {} segment(s)",
        keydir.len(),
        segment_ids.len()
    );
    Ok(keydir)
}

fn replay_segment(dir: &Path, id: SegmentId, max_log_size: u64, keydir: &mut KeyDir) -> Result<()> {
    let path = segment_path(dir, id);
    let mut file = std::fs::File::open(&path)?;
    let file_len = file.metadata()?.len();
    let read_len = file_len.min(max_log_size) as usize;
    if read_len == 0 {
        return Ok(());
    }
    let mut buf = vec![0u8; read_len];
    file.read_exact(&mut buf)?;

    let mut pos = 0usize;
    loop {
        if buf.len() - pos < HEADER_SIZE {
            break;
        }
        let (timestamp, key_size, value_size) = codec::decode_header(&buf[pos..]);
        let record_length = codec::record_length(key_size as usize, value_size as usize);
        if buf.len() - pos < record_length {
            log::debug!(
                "segment {id} has a torn trailing record at offset {pos}, truncating replay"
            );
            break;
        }

        let key_start = pos + HEADER_SIZE;
        let key_end = key_start + key_size as usize;
        let value_end = key_end + value_size as usize;
        let key = &buf[key_start..key_end];
        let value = &buf[key_end..value_end];

        if value == codec::TOMBSTONE {
            keydir.delete(key);
        } else {
            keydir.put(
                key.to_vec(),
                Locator { segment_id: id, offset: pos as u64, length: record_length as u32, timestamp },
            );
        }
        pos += record_length;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Segment;

    #[test]
    fn empty_segment_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        Segment::open_active(dir.path(), 1).unwrap();
        let keydir = replay(dir.path(), &[1], 4096).unwrap();
        assert!(keydir.is_empty());
    }

    #[test]
    fn last_write_wins_within_a_segment() {
        let dir = tempfile::tempdir().unwrap();
        let mut seg = Segment::open_active(dir.path(), 1).unwrap();
        seg.append(&codec::encode_kv(1.0, b"foo", b"v1")).unwrap();
        seg.append(&codec::encode_kv(2.0, b"foo", b"v2")).unwrap();
        let keydir = replay(dir.path(), &[1], 4096).unwrap();
        let locator = keydir.get(b"foo").unwrap();
        assert_eq!(locator.timestamp, 2.0);
    }

    #[test]
    fn tombstone_removes_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut seg = Segment::open_active(dir.path(), 1).unwrap();
        seg.append(&codec::encode_kv(1.0, b"foo", b"v1")).unwrap();
        seg.append(&codec::encode_kv(2.0, b"foo", codec::TOMBSTONE)).unwrap();
        let keydir = replay(dir.path(), &[1], 4096).unwrap();
        assert!(keydir.get(b"foo").is_none());
    }

    #[test]
    fn torn_trailing_record_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut seg = Segment::open_active(dir.path(), 1).unwrap();
        seg.append(&codec::encode_kv(1.0, b"foo", b"v1")).unwrap();
        let full = codec::encode_kv(2.0, b"bar", b"v2");
        seg.append(&full[..full.len() - 2]).unwrap(); // torn write
        let keydir = replay(dir.path(), &[1], 4096).unwrap();
        assert!(keydir.get(b"foo").is_some());
        assert!(keydir.get(b"bar").is_none());
    }

    #[test]
    fn torn_trailing_header_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut seg = Segment::open_active(dir.path(), 1).unwrap();
        seg.append(&codec::encode_kv(1.0, b"foo", b"v1")).unwrap();
        seg.append(&[0u8; 5]).unwrap(); // fewer than HEADER_SIZE bytes remain
        let keydir = replay(dir.path(), &[1], 4096).unwrap();
        assert!(keydir.get(b"foo").is_some());
        assert_eq!(keydir.len(), 1);
    }

    #[test]
    fn ascending_segment_order_determines_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut seg1 = Segment::open_active(dir.path(), 1).unwrap();
        seg1.append(&codec::encode_kv(1.0, b"foo", b"old")).unwrap();
        let mut seg2 = Segment::open_active(dir.path(), 2).unwrap();
        seg2.append(&codec::encode_kv(2.0, b"foo", b"new")).unwrap();
        let keydir = replay(dir.path(), &[1, 2], 4096).unwrap();
        assert_eq!(keydir.get(b"foo").unwrap().segment_id, 2);
    }
}
