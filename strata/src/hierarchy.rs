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

use std::{fmt::Debug, sync::Arc};

use strata_common::{
    code::{Key, Value},
    error::{Error, Result},
    event::{Event, EventListener},
};

use crate::{
    entry::CacheEntry,
    statistics::StatisticsSnapshot,
    tier::{CacheTier, PutOutcome},
};

/// An ordered chain of cache tiers.
///
/// Tier 0 is the innermost tier. New entries enter tier 0, entries evicted from tier `i` are demoted
/// into tier `i + 1`, and an entry hit in a lower tier is promoted back into tier 0. An entry leaves
/// the hierarchy only when it is evicted from the last tier.
///
/// A key lives in at most one tier. Operations that span tiers lock them one at a time in ascending
/// order and never hold two tier locks at once, so a concurrent reader may transiently miss an entry
/// that is being moved.
pub struct CacheHierarchy<K, V>
where
    K: Key,
    V: Value,
{
    tiers: Vec<CacheTier<K, V>>,
    event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,
}

impl<K, V> Debug for CacheHierarchy<K, V>
where
    K: Key,
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHierarchy").field("tiers", &self.tiers).finish()
    }
}

impl<K, V> Default for CacheHierarchy<K, V>
where
    K: Key,
    V: Value,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheHierarchy<K, V>
where
    K: Key,
    V: Value,
{
    /// Create a hierarchy without tiers.
    ///
    /// Entries put into a hierarchy without tiers are expelled immediately.
    pub fn new() -> Self {
        Self {
            tiers: vec![],
            event_listener: None,
        }
    }

    /// Append a tier as the new last tier. Returns the count of tiers.
    pub fn add_tier(&mut self, tier: CacheTier<K, V>) -> usize {
        tracing::info!(
            "[hierarchy]: add {} tier {} with capacity {} at {}",
            tier.kind(),
            tier.name(),
            tier.max_size(),
            self.tiers.len()
        );
        self.tiers.push(tier);
        self.tiers.len()
    }

    /// Remove the tier at `index` and return it. Its entries are not migrated.
    pub fn remove_tier(&mut self, index: usize) -> Result<CacheTier<K, V>> {
        if index >= self.tiers.len() {
            return Err(Error::tier_out_of_range(index, self.tiers.len()));
        }
        let tier = self.tiers.remove(index);
        tracing::info!(
            "[hierarchy]: remove tier {} at {index} with {} entries",
            tier.name(),
            tier.len()
        );
        Ok(tier)
    }

    /// Get the tier at `index`.
    pub fn tier(&self, index: usize) -> Option<&CacheTier<K, V>> {
        self.tiers.get(index)
    }

    /// All tiers, from the innermost one to the last one.
    pub fn tiers(&self) -> &[CacheTier<K, V>] {
        &self.tiers
    }

    /// Count of tiers.
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Returns `true` if the tier at `index` is full.
    pub fn is_tier_full(&self, index: usize) -> Result<bool> {
        self.tiers
            .get(index)
            .map(|tier| tier.is_full())
            .ok_or_else(|| Error::tier_out_of_range(index, self.tiers.len()))
    }

    /// Count of entries over all tiers.
    pub fn len(&self) -> usize {
        self.tiers.iter().map(|tier| tier.len()).sum()
    }

    /// Returns `true` if no tier holds an entry.
    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(|tier| tier.is_empty())
    }

    /// Sum of the capacities of all tiers.
    pub fn max_size(&self) -> usize {
        self.tiers.iter().map(|tier| tier.max_size()).sum()
    }

    /// Returns `true` if any tier holds the key.
    pub fn contains(&self, key: &K) -> bool {
        self.locate(key).is_some()
    }

    /// Index of the tier that holds the key.
    pub fn locate(&self, key: &K) -> Option<usize> {
        self.tiers.iter().position(|tier| tier.contains(key))
    }

    /// Counter-wise sum of the statistics of all tiers.
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.tiers
            .iter()
            .fold(StatisticsSnapshot::default(), |acc, tier| acc.merge(&tier.statistics().snapshot()))
    }

    fn notify(&self, event: Event, key: &K, value: &V) {
        if let Some(listener) = self.event_listener.as_ref() {
            listener.on_leave(event, key, value);
        }
    }

    /// Insert or overwrite the entry in tier 0.
    ///
    /// An entry evicted from tier 0 to make room is demoted into tier 1, whose victim is demoted into
    /// tier 2, and so on. Returns the entry evicted from the last tier if the demotions run off the end
    /// of the hierarchy. Otherwise returns the previous entry of the key if there is one, or `None`.
    ///
    /// If the key lives in a lower tier it is removed from there.
    pub fn put(&self, key: K, value: V) -> Result<Option<CacheEntry<K, V>>> {
        let Some(first) = self.tiers.first() else {
            let entry = CacheEntry::new(key, value);
            self.expel(&entry);
            return Ok(Some(entry));
        };

        let outcome = first.put_inner(key.clone(), value, true)?;
        let previous = self.settle(0, &key)?.map(|value| CacheEntry::new(key, value));

        match outcome {
            PutOutcome::Inserted | PutOutcome::Kept => Ok(previous),
            PutOutcome::Replaced(entry) => Ok(Some(entry)),
            PutOutcome::Evicted(entry) => Ok(self.demote(1, entry)?.or(previous)),
        }
    }

    /// Get the value of the key.
    ///
    /// A hit in tier 0 marks the entry as accessed. A hit in a lower tier moves the entry into tier 0,
    /// demoting tier 0's victim as [`CacheHierarchy::put`] does.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let Some(first) = self.tiers.first() else {
            return Ok(None);
        };
        if let Some(value) = first.get(key)? {
            return Ok(Some(value));
        }

        for (index, tier) in self.tiers.iter().enumerate().skip(1) {
            match tier.take(key)? {
                Some(value) => {
                    tier.statistics().record_hit();
                    tracing::debug!("[hierarchy]: promote {key:?} from tier {index}");
                    self.promote(index, key, &value)?;
                    return Ok(Some(value));
                }
                None => tier.statistics().record_miss(),
            }
        }

        Ok(None)
    }

    /// Move an entry taken out of tier `from` into tier 0.
    ///
    /// If tier 0 rejects the entry, it is put back into tier `from` before the error is returned.
    fn promote(&self, from: usize, key: &K, value: &V) -> Result<()> {
        let outcome = match self.tiers[0].put_inner(key.clone(), value.clone(), false) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("[hierarchy]: return {key:?} to tier {from} after a failed promotion: {e}");
                let outcome = self.tiers[from].put_inner(key.clone(), value.clone(), false)?;
                self.settle(from, key)?;
                if let PutOutcome::Evicted(entry) = outcome {
                    self.demote(from + 1, entry)?;
                }
                return Err(e);
            }
        };
        if let PutOutcome::Kept = outcome {
            tracing::debug!("[hierarchy]: skip promotion of {key:?}, tier 0 already holds a newer entry");
            return Ok(());
        }
        self.settle(0, key)?;

        if let PutOutcome::Evicted(entry) = outcome {
            if let Some(expelled) = self.demote(1, entry)? {
                tracing::debug!("[hierarchy]: drop {:?} expelled while promoting", expelled.key);
            }
        }
        Ok(())
    }

    /// Carry an evicted entry down from tier `from`, returns the entry that runs off the last tier.
    fn demote(&self, from: usize, entry: CacheEntry<K, V>) -> Result<Option<CacheEntry<K, V>>> {
        let mut entry = entry;
        for (index, tier) in self.tiers.iter().enumerate().skip(from) {
            tracing::debug!("[hierarchy]: demote {:?} into tier {index}", entry.key);
            let (key, value) = entry.into_parts();
            // Kept only to report the entry if the tier rejects it.
            let backup = self.event_listener.as_ref().map(|_| value.clone());
            let outcome = match tier.put_inner(key.clone(), value, true) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("[hierarchy]: expel {key:?} after a failed demotion into tier {index}: {e}");
                    if let Some(value) = backup.as_ref() {
                        self.notify(Event::Expel, &key, value);
                    }
                    return Err(e);
                }
            };
            self.settle(index, &key)?;
            match outcome {
                PutOutcome::Inserted | PutOutcome::Kept => return Ok(None),
                PutOutcome::Replaced(stale) => {
                    tracing::debug!("[hierarchy]: demotion overwrites stale {:?} in tier {index}", stale.key);
                    return Ok(None);
                }
                PutOutcome::Evicted(next) => entry = next,
            }
        }
        self.expel(&entry);
        Ok(Some(entry))
    }

    /// Keep a single copy of the key after it has been written into tier `index`.
    ///
    /// The copy in the tier with the smallest index survives. Copies in tiers below `index` are
    /// removed and the first removed value is returned. If a tier above `index` holds the key, the copy
    /// in tier `index` is removed instead.
    ///
    /// Two racing writers of the same key into different tiers each settle after writing, and tier
    /// locks are taken one at a time, so at least one of them observes the other's copy.
    fn settle(&self, index: usize, key: &K) -> Result<Option<V>> {
        let mut removed = None;
        for (i, tier) in self.tiers.iter().enumerate() {
            if i < index {
                if tier.contains(key) {
                    tracing::debug!("[hierarchy]: drop stale {key:?} from tier {index}, tier {i} holds it");
                    self.tiers[index].take(key)?;
                    return Ok(None);
                }
            } else if i > index {
                if let Some(value) = tier.take(key)? {
                    tracing::debug!("[hierarchy]: drop stale {key:?} from tier {i}, tier {index} holds it");
                    removed.get_or_insert(value);
                }
            }
        }
        Ok(removed)
    }

    fn expel(&self, entry: &CacheEntry<K, V>) {
        tracing::debug!("[hierarchy]: expel {:?}", entry.key);
        self.notify(Event::Expel, &entry.key, &entry.value);
    }

    /// Remove the key from every tier. Returns the removed value, `None` if no tier held the key.
    pub fn delete(&self, key: &K) -> Result<Option<V>> {
        let mut removed = None;
        for tier in self.tiers.iter() {
            if let Some(value) = tier.delete(key)? {
                removed.get_or_insert(value);
            }
        }
        if let Some(value) = removed.as_ref() {
            self.notify(Event::Remove, key, value);
        }
        Ok(removed)
    }

    /// Evict one entry from tier 0 and demote it.
    ///
    /// The total count of entries is unchanged unless every tier below is full, in which case the
    /// entry evicted from the last tier is returned.
    pub fn pop(&self) -> Result<Option<CacheEntry<K, V>>> {
        let Some(first) = self.tiers.first() else {
            return Ok(None);
        };
        match first.evict_one()? {
            Some(entry) => self.demote(1, entry),
            None => Ok(None),
        }
    }

    /// Remove all entries from all tiers.
    pub fn clear(&self) -> Result<()> {
        let collect = self.event_listener.is_some();
        for tier in self.tiers.iter() {
            for entry in tier.clear_inner(collect)? {
                self.notify(Event::Clear, &entry.key, &entry.value);
            }
        }
        Ok(())
    }
}

/// Cache hierarchy builder.
pub struct CacheHierarchyBuilder<K, V>
where
    K: Key,
    V: Value,
{
    tiers: Vec<CacheTier<K, V>>,
    event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,
}

impl<K, V> Default for CacheHierarchyBuilder<K, V>
where
    K: Key,
    V: Value,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheHierarchyBuilder<K, V>
where
    K: Key,
    V: Value,
{
    /// Create a cache hierarchy builder.
    pub fn new() -> Self {
        Self {
            tiers: vec![],
            event_listener: None,
        }
    }

    /// Append a tier below the tiers added so far.
    pub fn with_tier(mut self, tier: CacheTier<K, V>) -> Self {
        self.tiers.push(tier);
        self
    }

    /// Set event listener.
    ///
    /// The listener is told about entries that leave the hierarchy: [`Event::Expel`] for entries evicted
    /// from the last tier, [`Event::Remove`] for deletes and [`Event::Clear`] for clears. Movements
    /// between tiers are reported to the listeners of the tiers.
    ///
    /// Default: No event listener installed.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Key = K, Value = V>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Build the cache hierarchy.
    pub fn build(self) -> CacheHierarchy<K, V> {
        let mut hierarchy = CacheHierarchy::new();
        hierarchy.event_listener = self.event_listener;
        for tier in self.tiers {
            hierarchy.add_tier(tier);
        }
        hierarchy
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use parking_lot::Mutex;
    use strata_common::error::ErrorKind;
    use strata_policy::EvictionKind;

    use super::*;
    use crate::tier::CacheTierBuilder;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<CacheHierarchy<u64, String>>();
    }

    fn tier(kind: EvictionKind, capacity: usize) -> CacheTier<u64, u64> {
        CacheTierBuilder::new(capacity).with_eviction(kind).build().unwrap()
    }

    #[test_log::test]
    fn test_single_tier_expels() {
        let hierarchy = CacheHierarchyBuilder::new().with_tier(tier(EvictionKind::Lru, 3)).build();
        for i in 0..3 {
            assert_eq!(hierarchy.put(i, i).unwrap(), None);
        }
        assert_eq!(hierarchy.put(3, 3).unwrap(), Some(CacheEntry::new(0, 0)));
        assert_eq!(hierarchy.put(1, 10).unwrap(), Some(CacheEntry::new(1, 1)));
        assert_eq!(hierarchy.pop().unwrap(), Some(CacheEntry::new(2, 2)));
        assert_eq!(hierarchy.len(), 2);
    }

    #[test_log::test]
    fn test_no_tier() {
        let hierarchy = CacheHierarchy::<u64, u64>::new();
        assert_eq!(hierarchy.put(1, 1).unwrap(), Some(CacheEntry::new(1, 1)));
        assert_eq!(hierarchy.get(&1).unwrap(), None);
        assert_eq!(hierarchy.pop().unwrap(), None);
        assert_eq!(hierarchy.delete(&1).unwrap(), None);
        assert_eq!(hierarchy.max_size(), 0);
        assert!(hierarchy.is_empty());
    }

    #[test_log::test]
    fn test_cascade_through_three_tiers() {
        let hierarchy = CacheHierarchyBuilder::new()
            .with_tier(tier(EvictionKind::Lru, 2))
            .with_tier(tier(EvictionKind::Lru, 2))
            .with_tier(tier(EvictionKind::Mru, 2))
            .build();
        assert_eq!(hierarchy.max_size(), 6);

        for i in 0..6 {
            assert_eq!(hierarchy.put(i, i).unwrap(), None);
        }
        assert_eq!(hierarchy.tier(0).unwrap().keys(), vec![4, 5]);
        assert_eq!(hierarchy.tier(1).unwrap().keys(), vec![2, 3]);
        assert_eq!(hierarchy.tier(2).unwrap().keys(), vec![0, 1]);

        // The last tier is MRU, so its most recently used entry runs off.
        assert_eq!(hierarchy.put(6, 6).unwrap(), Some(CacheEntry::new(1, 1)));
        assert_eq!(hierarchy.tier(1).unwrap().keys(), vec![3, 4]);
        assert_eq!(hierarchy.tier(2).unwrap().keys(), vec![0, 2]);
        assert_eq!(hierarchy.len(), 6);
        assert!((0..3).all(|i| hierarchy.is_tier_full(i).unwrap()));
    }

    #[test_log::test]
    fn test_promotion() {
        let hierarchy = CacheHierarchyBuilder::new()
            .with_tier(tier(EvictionKind::Lru, 2))
            .with_tier(tier(EvictionKind::Lru, 4))
            .build();
        for i in 0..4 {
            hierarchy.put(i, i * 10).unwrap();
        }
        assert_eq!(hierarchy.locate(&0), Some(1));

        assert_eq!(hierarchy.get(&0).unwrap(), Some(0));
        assert_eq!(hierarchy.locate(&0), Some(0));
        // Tier 0's victim takes the place of the promoted entry.
        assert_eq!(hierarchy.locate(&2), Some(1));
        assert_eq!(hierarchy.tier(0).unwrap().keys(), vec![3, 0]);
        assert_eq!(hierarchy.tier(1).unwrap().keys(), vec![1, 2]);
        assert_eq!(hierarchy.len(), 4);

        assert_eq!(hierarchy.get(&42).unwrap(), None);
        let stats = hierarchy.statistics();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 3);
    }

    #[test_log::test]
    fn test_put_moves_key_out_of_lower_tier() {
        let hierarchy = CacheHierarchyBuilder::new()
            .with_tier(tier(EvictionKind::Lru, 2))
            .with_tier(tier(EvictionKind::Lru, 2))
            .build();
        for i in 0..4 {
            hierarchy.put(i, i).unwrap();
        }
        assert_eq!(hierarchy.locate(&1), Some(1));

        // The lower copy is removed and reported as the previous value, tier 0's victim fills the gap.
        assert_eq!(hierarchy.put(1, 100).unwrap(), Some(CacheEntry::new(1, 1)));
        assert_eq!(hierarchy.locate(&1), Some(0));
        assert_eq!(hierarchy.tier(1).unwrap().keys(), vec![0, 2]);
        assert_eq!(hierarchy.get(&1).unwrap(), Some(100));
        assert_eq!(hierarchy.len(), 4);
    }

    #[test_log::test]
    fn test_delete_and_remove_tier() {
        let mut hierarchy = CacheHierarchyBuilder::new()
            .with_tier(tier(EvictionKind::Lru, 2))
            .with_tier(tier(EvictionKind::Lru, 2))
            .build();
        for i in 0..4 {
            hierarchy.put(i, i).unwrap();
        }
        assert_eq!(hierarchy.delete(&0).unwrap(), Some(0));
        assert_eq!(hierarchy.delete(&0).unwrap(), None);
        assert!(!hierarchy.contains(&0));
        assert_eq!(hierarchy.len(), 3);

        assert_eq!(hierarchy.remove_tier(2).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(hierarchy.is_tier_full(2).unwrap_err().kind(), ErrorKind::OutOfRange);

        let removed = hierarchy.remove_tier(1).unwrap();
        assert_eq!(removed.keys(), vec![1]);
        assert_eq!(hierarchy.tier_count(), 1);
        assert_eq!(hierarchy.len(), 2);

        assert_eq!(hierarchy.add_tier(removed), 2);
        assert_eq!(hierarchy.locate(&1), Some(1));

        hierarchy.clear().unwrap();
        assert!(hierarchy.is_empty());
    }

    #[derive(Debug, Default)]
    struct Recorder {
        events: Mutex<Vec<(Event, u64)>>,
    }

    impl EventListener for Recorder {
        type Key = u64;
        type Value = u64;

        fn on_leave(&self, reason: Event, key: &u64, _: &u64) {
            self.events.lock().push((reason, *key));
        }
    }

    #[test_log::test]
    fn test_event_listener() {
        let recorder = Arc::new(Recorder::default());
        let hierarchy = CacheHierarchyBuilder::<u64, u64>::new()
            .with_tier(tier(EvictionKind::Lru, 2))
            .with_tier(tier(EvictionKind::Lru, 2))
            .with_event_listener(recorder.clone())
            .build();

        for i in 0..6 {
            hierarchy.put(i, i).unwrap();
        }
        hierarchy.delete(&3).unwrap();
        hierarchy.clear().unwrap();

        let events = recorder.events.lock().clone();
        assert_eq!(&events[..3], &[(Event::Expel, 0), (Event::Expel, 1), (Event::Remove, 3)]);
        assert_eq!(
            events[3..].iter().copied().sorted_by_key(|(_, key)| *key).collect_vec(),
            vec![(Event::Clear, 2), (Event::Clear, 4), (Event::Clear, 5)]
        );
    }
}
