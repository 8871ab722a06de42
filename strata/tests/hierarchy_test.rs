// Copyright 2026 strata Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end scenarios of tiers and hierarchies.

use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;
use strata::{
    CacheEntry, CacheHierarchy, CacheHierarchyBuilder, CacheTier, CacheTierBuilder, Error, ErrorKind, Event,
    EventListener, EvictionKind, FileStorage, MemoryStorage, Result, Storage,
};

fn squares(kind: EvictionKind, capacity: usize, keys: impl IntoIterator<Item = u64>) -> CacheTier<u64, u64> {
    let tier = CacheTierBuilder::new(capacity).with_eviction(kind).build().unwrap();
    for i in keys {
        tier.put(i, i * i).unwrap();
    }
    tier
}

#[test_log::test]
fn test_single_lru_tier() {
    let hierarchy = CacheHierarchyBuilder::new()
        .with_tier(CacheTierBuilder::new(5).build().unwrap())
        .build();

    for i in 0..=7u64 {
        hierarchy.put(i, i * i).unwrap();
    }
    assert_eq!(hierarchy.tier(0).unwrap().keys(), vec![3, 4, 5, 6, 7]);
    assert_eq!(hierarchy.len(), 5);

    assert_eq!(hierarchy.pop().unwrap(), Some(CacheEntry::new(3, 9)));
    assert_eq!(hierarchy.len(), 4);
}

#[test_log::test]
fn test_two_lru_tiers() {
    let hierarchy = CacheHierarchyBuilder::new()
        .with_tier(squares(EvictionKind::Lru, 5, 3..=7))
        .with_tier(CacheTierBuilder::new(5).build().unwrap())
        .build();

    // 3 is relocated into tier 1. Nothing left the hierarchy, so put returns nothing.
    assert_eq!(hierarchy.put(8, 64).unwrap(), None);
    assert_eq!(hierarchy.tier(0).unwrap().keys(), vec![4, 5, 6, 7, 8]);
    assert_eq!(hierarchy.tier(1).unwrap().keys(), vec![3]);
    assert_eq!(hierarchy.tier(1).unwrap().get(&3).unwrap(), Some(9));

    // Tier 1 has room, so popping tier 0 only moves its victim down.
    assert_eq!(hierarchy.pop().unwrap(), None);
    assert_eq!(hierarchy.tier(1).unwrap().keys(), vec![3, 4]);
    assert_eq!(hierarchy.len(), 6);
}

#[test_log::test]
fn test_single_mru_tier() {
    let hierarchy = CacheHierarchyBuilder::new()
        .with_tier(squares(EvictionKind::Mru, 5, 0..=7))
        .build();

    assert_eq!(hierarchy.tier(0).unwrap().keys(), vec![0, 1, 2, 3, 7]);
    assert_eq!(hierarchy.pop().unwrap(), Some(CacheEntry::new(7, 49)));
}

#[test_log::test]
fn test_pop_conserves_entries() {
    let hierarchy = CacheHierarchyBuilder::new()
        .with_tier(CacheTierBuilder::new(4).build().unwrap())
        .with_tier(CacheTierBuilder::new(4).with_eviction(EvictionKind::Mru).build().unwrap())
        .with_tier(CacheTierBuilder::new(4).build().unwrap())
        .build();
    for i in 0..8u64 {
        hierarchy.put(i, i).unwrap();
    }
    assert_eq!(hierarchy.len(), 8);

    // Entries only move down until every tier below tier 0 is full.
    for _ in 0..4 {
        assert_eq!(hierarchy.pop().unwrap(), None);
        assert_eq!(hierarchy.len(), 8);
    }
    assert!(hierarchy.tier(0).unwrap().is_empty());
    assert_eq!(hierarchy.pop().unwrap(), None);

    // Refill tier 0, the lower tiers are full now.
    for i in 8..12u64 {
        hierarchy.put(i, i).unwrap();
    }
    assert_eq!(hierarchy.len(), 12);
    assert!(hierarchy.pop().unwrap().is_some());
    assert_eq!(hierarchy.len(), 11);
}

#[test_log::test]
fn test_promotion_keeps_single_copy() {
    let hierarchy = CacheHierarchyBuilder::new()
        .with_tier(CacheTierBuilder::new(3).build().unwrap())
        .with_tier(CacheTierBuilder::new(3).build().unwrap())
        .with_tier(CacheTierBuilder::new(3).build().unwrap())
        .build();
    for i in 0..9u64 {
        hierarchy.put(i, i + 100).unwrap();
    }
    assert_eq!(hierarchy.locate(&0), Some(2));

    assert_eq!(hierarchy.get(&0).unwrap(), Some(100));
    assert_eq!(hierarchy.locate(&0), Some(0));
    assert_eq!(hierarchy.len(), 9);

    let keys = (0..3)
        .flat_map(|i| hierarchy.tier(i).unwrap().keys())
        .sorted()
        .collect_vec();
    assert_eq!(keys, (0..9u64).collect_vec());
}

#[test_log::test]
fn test_delete_is_idempotent() {
    let hierarchy = CacheHierarchyBuilder::new()
        .with_tier(squares(EvictionKind::Lru, 2, 0..2))
        .with_tier(squares(EvictionKind::Lru, 2, 2..4))
        .build();

    assert_eq!(hierarchy.delete(&3).unwrap(), Some(9));
    let len = hierarchy.len();
    assert_eq!(hierarchy.delete(&3).unwrap(), None);
    assert_eq!(hierarchy.len(), len);
    assert_eq!(hierarchy.delete(&42).unwrap(), None);
}

#[test_log::test]
fn test_mixed_storage_tiers() {
    let file = Arc::new(FileStorage::<u64, String>::temp().unwrap());
    let mut hierarchy: CacheHierarchy<u64, String> = CacheHierarchyBuilder::new()
        .with_tier(CacheTierBuilder::new(4).with_name("memory").build().unwrap())
        .build();
    hierarchy.add_tier(
        CacheTierBuilder::<u64, String>::new(16)
            .with_name("file")
            .with_storage(file.clone())
            .build()
            .unwrap(),
    );

    for i in 0..20u64 {
        assert_eq!(hierarchy.put(i, format!("value-{i}")).unwrap(), None);
    }
    assert_eq!(hierarchy.tier(1).unwrap().len(), 16);
    assert_eq!(file.len(), 16);

    assert_eq!(hierarchy.get(&0).unwrap(), Some("value-0".to_string()));
    assert_eq!(hierarchy.locate(&0), Some(0));
    assert!(!file.contains(&0));

    assert_eq!(hierarchy.put(20, "value-20".to_string()).unwrap().map(|e| e.key), Some(1));
    hierarchy.clear().unwrap();
    assert!(file.is_empty());
}

#[test_log::test]
fn test_file_tier_recovers() {
    let dir = tempfile::tempdir().unwrap();

    {
        let tier = CacheTierBuilder::<u64, Vec<u8>>::new(8)
            .with_storage(Arc::new(FileStorage::<u64, Vec<u8>>::open(dir.path()).unwrap()))
            .build()
            .unwrap();
        for i in 0..10u64 {
            tier.put(i, vec![i as u8; 8]).unwrap();
        }
        assert_eq!(tier.len(), 8);
    }

    let tier = CacheTierBuilder::<u64, Vec<u8>>::new(8)
        .with_storage(Arc::new(FileStorage::<u64, Vec<u8>>::open(dir.path()).unwrap()))
        .build()
        .unwrap();
    assert_eq!(tier.len(), 8);
    assert_eq!(tier.keys().into_iter().sorted().collect_vec(), (2..10u64).collect_vec());
    assert_eq!(tier.get(&9).unwrap(), Some(vec![9; 8]));
    assert_eq!(tier.get(&0).unwrap(), None);
}

/// Memory storage that rejects every write of one key.
#[derive(Debug)]
struct RejectingStorage {
    inner: MemoryStorage<u64, u64>,
    rejected: u64,
}

impl RejectingStorage {
    fn new(rejected: u64) -> Self {
        Self {
            inner: MemoryStorage::new(),
            rejected,
        }
    }
}

impl Storage<u64, u64> for RejectingStorage {
    fn put(&self, key: u64, value: u64) -> Result<Option<u64>> {
        if key == self.rejected {
            return Err(Error::new(ErrorKind::Io, "write rejected").with_context("key", key));
        }
        self.inner.put(key, value)
    }

    fn get(&self, key: &u64) -> Result<Option<u64>> {
        self.inner.get(key)
    }

    fn contains(&self, key: &u64) -> bool {
        self.inner.contains(key)
    }

    fn remove(&self, key: &u64) -> Result<Option<u64>> {
        self.inner.remove(key)
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    fn keys(&self) -> Vec<u64> {
        self.inner.keys()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

fn rejecting_hierarchy(rejected: u64) -> CacheHierarchy<u64, u64> {
    CacheHierarchyBuilder::new()
        .with_tier(
            CacheTierBuilder::<u64, u64>::new(2)
                .with_storage(Arc::new(RejectingStorage::new(rejected)))
                .build()
                .unwrap(),
        )
        .with_tier(CacheTierBuilder::new(5).build().unwrap())
        .build()
}

#[test_log::test]
fn test_failed_put_keeps_entries() {
    let hierarchy = rejecting_hierarchy(99);
    hierarchy.put(1, 10).unwrap();
    hierarchy.put(2, 20).unwrap();

    let err = hierarchy.put(99, 990).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(hierarchy.len(), 2);
    assert_eq!(hierarchy.tier(0).unwrap().keys(), vec![1, 2]);
    assert!(!hierarchy.contains(&99));

    // The entry that would have made room is still the first to move down.
    assert_eq!(hierarchy.put(3, 30).unwrap(), None);
    assert_eq!(hierarchy.locate(&1), Some(1));
    assert_eq!(hierarchy.get(&1).unwrap(), Some(10));
    assert_eq!(hierarchy.len(), 3);
}

#[test_log::test]
fn test_failed_promotion_keeps_entry_in_place() {
    let hierarchy = rejecting_hierarchy(99);
    hierarchy.put(1, 10).unwrap();
    hierarchy.put(2, 20).unwrap();
    hierarchy.tier(1).unwrap().put(99, 990).unwrap();

    let err = hierarchy.get(&99).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(hierarchy.locate(&99), Some(1));
    assert_eq!(hierarchy.tier(1).unwrap().get(&99).unwrap(), Some(990));
    assert_eq!(hierarchy.tier(0).unwrap().keys(), vec![1, 2]);
    assert_eq!(hierarchy.len(), 3);
}

#[derive(Debug, Default)]
struct ExpelRecorder(Mutex<Vec<(u64, u64)>>);

impl EventListener for ExpelRecorder {
    type Key = u64;
    type Value = u64;

    fn on_leave(&self, reason: Event, key: &u64, value: &u64) {
        if reason == Event::Expel {
            self.0.lock().push((*key, *value));
        }
    }
}

#[test_log::test]
fn test_failed_demotion_reports_expel() {
    let recorder = Arc::new(ExpelRecorder::default());
    let hierarchy = CacheHierarchyBuilder::new()
        .with_tier(CacheTierBuilder::new(2).build().unwrap())
        .with_tier(
            CacheTierBuilder::<u64, u64>::new(5)
                .with_storage(Arc::new(RejectingStorage::new(1)))
                .build()
                .unwrap(),
        )
        .with_event_listener(recorder.clone())
        .build();
    hierarchy.put(1, 10).unwrap();
    hierarchy.put(2, 20).unwrap();

    let err = hierarchy.put(3, 30).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(recorder.0.lock().clone(), vec![(1, 10)]);
    assert!(!hierarchy.contains(&1));
    assert_eq!(hierarchy.tier(0).unwrap().keys(), vec![2, 3]);
}
