//! Bounded category caches and the derived frame cache
//!
//! [`BoundedCache`] is a capacity-bounded name-to-record map with
//! freshness-based eviction: when an upsert pushes the cache over
//! capacity, the entries with the oldest observed modification time are
//! dropped. This is not an LRU; reads never promote entries. One instance
//! is used for still images and one for GIFs.
//!
//! [`FrameCache`] maps a GIF basename to its most recent extraction
//! result. It has no eviction policy of its own: it is bounded implicitly
//! because it holds at most one entry per name in the (bounded) GIF cache,
//! and the service layer invalidates entries whenever the source record
//! changes, is removed, or is evicted.

use std::collections::HashMap;

use crate::model::{ExtractedFrameSet, FileRecord};

#[derive(Debug, Clone)]
struct Slot {
    record: FileRecord,
    /// Monotonic insertion counter; deterministic tie-break when two
    /// records share a modification time
    seq: u64,
}

/// Capacity-bounded mapping from basename to [`FileRecord`]
#[derive(Debug)]
pub struct BoundedCache {
    capacity: usize,
    next_seq: u64,
    entries: HashMap<String, Slot>,
}

impl BoundedCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_seq: 0,
            entries: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces the record for `record.name`, then evicts the
    /// oldest-modified entries until the cache is back within capacity.
    ///
    /// Returns the evicted names so the caller can invalidate anything
    /// derived from them. A replaced record is not an eviction.
    pub fn upsert(&mut self, record: FileRecord) -> Vec<String> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(record.name.clone(), Slot { record, seq });

        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .values()
                .min_by_key(|slot| (slot.record.modified_at, slot.seq))
                .map(|slot| slot.record.name.clone());
            match oldest {
                Some(name) => {
                    self.entries.remove(&name);
                    evicted.push(name);
                }
                None => break,
            }
        }
        evicted
    }

    /// Removes the entry if present; no-op otherwise
    pub fn remove(&mut self, name: &str) -> Option<FileRecord> {
        self.entries.remove(name).map(|slot| slot.record)
    }

    /// Looks up a record without any side effects
    pub fn get(&self, name: &str) -> Option<&FileRecord> {
        self.entries.get(name).map(|slot| &slot.record)
    }

    /// Records ordered by descending modification time, optionally truncated
    pub fn values_newest_first(&self, limit: Option<usize>) -> Vec<FileRecord> {
        let mut slots: Vec<&Slot> = self.entries.values().collect();
        slots.sort_by(|a, b| {
            (b.record.modified_at, b.seq).cmp(&(a.record.modified_at, a.seq))
        });
        let take = limit.unwrap_or(slots.len());
        slots
            .into_iter()
            .take(take)
            .map(|slot| slot.record.clone())
            .collect()
    }
}

/// Derived cache mapping a GIF basename to its latest extraction result
#[derive(Debug, Default)]
pub struct FrameCache {
    entries: HashMap<String, ExtractedFrameSet>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ExtractedFrameSet> {
        self.entries.get(name)
    }

    pub fn put(&mut self, set: ExtractedFrameSet) {
        self.entries.insert(set.source_name.clone(), set);
    }

    pub fn invalidate(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::model::MediaKind;

    fn record_at(name: &str, minute: i64) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            path: PathBuf::from("/shots").join(name),
            size: 1024,
            modified_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minute),
            kind: MediaKind::Image,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let mut cache = BoundedCache::new(5);
        cache.upsert(record_at("a.png", 0));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a.png").unwrap().name, "a.png");
        assert!(cache.get("b.png").is_none());
    }

    #[test]
    fn test_upsert_same_name_replaces_in_place() {
        let mut cache = BoundedCache::new(2);
        cache.upsert(record_at("a.png", 0));
        let evicted = cache.upsert(record_at("a.png", 5));

        assert!(evicted.is_empty());
        assert_eq!(cache.len(), 1);
        let stored = cache.get("a.png").unwrap();
        assert_eq!(stored.modified_at, record_at("a.png", 5).modified_at);
    }

    #[test]
    fn test_capacity_invariant_keeps_newest() {
        let mut cache = BoundedCache::new(3);
        let mut all_evicted = Vec::new();
        for i in 0..10 {
            all_evicted.extend(cache.upsert(record_at(&format!("f{i}.png"), i)));
            assert!(cache.len() <= 3, "capacity exceeded after upsert {i}");
        }

        // Survivors are exactly the three most recently modified
        let names: Vec<_> = cache
            .values_newest_first(None)
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["f9.png", "f8.png", "f7.png"]);
        assert_eq!(all_evicted.len(), 7);
    }

    #[test]
    fn test_eviction_is_by_modification_time_not_insertion() {
        let mut cache = BoundedCache::new(2);
        cache.upsert(record_at("new.png", 30));
        cache.upsert(record_at("old.png", 10));
        let evicted = cache.upsert(record_at("mid.png", 20));

        // The oldest-modified entry goes, despite being inserted second
        assert_eq!(evicted, vec!["old.png".to_string()]);
        assert!(cache.get("new.png").is_some());
        assert!(cache.get("mid.png").is_some());
    }

    #[test]
    fn test_eviction_tie_break_is_deterministic() {
        let mut cache = BoundedCache::new(2);
        cache.upsert(record_at("first.png", 0));
        cache.upsert(record_at("second.png", 0));
        let evicted = cache.upsert(record_at("third.png", 1));

        // Same mtime: the earlier insertion loses
        assert_eq!(evicted, vec!["first.png".to_string()]);
    }

    #[test]
    fn test_values_newest_first_with_limit() {
        let mut cache = BoundedCache::new(10);
        for i in 0..5 {
            cache.upsert(record_at(&format!("f{i}.png"), i));
        }

        let top = cache.values_newest_first(Some(2));
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "f4.png");
        assert_eq!(top[1].name, "f3.png");
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let mut cache = BoundedCache::new(2);
        assert!(cache.remove("ghost.png").is_none());
        cache.upsert(record_at("a.png", 0));
        assert!(cache.remove("a.png").is_some());
        assert!(cache.is_empty());
    }

    fn frame_set(name: &str) -> ExtractedFrameSet {
        ExtractedFrameSet {
            source_name: name.to_string(),
            source_modified_at: Utc::now(),
            frames: vec![],
            total_frames: 3,
            sample_stride: 1,
            failures: vec![],
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn test_frame_cache_put_get_invalidate() {
        let mut frames = FrameCache::new();
        assert!(frames.get("a.gif").is_none());

        frames.put(frame_set("a.gif"));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames.get("a.gif").unwrap().total_frames, 3);

        assert!(frames.invalidate("a.gif"));
        assert!(!frames.invalidate("a.gif"));
        assert!(frames.is_empty());
    }

    #[test]
    fn test_frame_cache_put_replaces() {
        let mut frames = FrameCache::new();
        frames.put(frame_set("a.gif"));
        let mut newer = frame_set("a.gif");
        newer.total_frames = 9;
        frames.put(newer);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames.get("a.gif").unwrap().total_frames, 9);
    }
}
