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

use parking_lot::{Mutex, MutexGuard};
use strata_common::{
    code::{Key, Value},
    error::Result,
    event::{Event, EventListener},
    strict_assert,
};
use strata_policy::{EvictionKind, EvictionPolicy};
use strata_storage::{MemoryStorage, Storage};

use crate::{entry::CacheEntry, statistics::Statistics};

/// Capacity used when a tier is built with a capacity below [`MIN_TIER_CAPACITY`].
pub const DEFAULT_TIER_CAPACITY: usize = 100;

/// Smallest capacity a tier accepts.
pub const MIN_TIER_CAPACITY: usize = 2;

/// Result of an insertion into a tier.
#[derive(Debug)]
pub(crate) enum PutOutcome<K, V> {
    /// The key was new and the tier had room.
    Inserted,
    /// The key was present, its previous entry is returned.
    Replaced(CacheEntry<K, V>),
    /// The key was new and the tier was full, the victim is returned.
    Evicted(CacheEntry<K, V>),
    /// The key was present and the insertion was asked not to overwrite it. Nothing was written.
    Kept,
}

struct TierInner<K, V>
where
    K: Key,
    V: Value,
{
    policy: EvictionPolicy<K>,
    storage: Arc<dyn Storage<K, V>>,
}

impl<K, V> TierInner<K, V>
where
    K: Key,
    V: Value,
{
    /// Forget the key in the policy if a failed storage operation left it out of the storage.
    fn reconcile(&self, key: &K) {
        if !self.storage.contains(key) && self.policy.forget(key) {
            tracing::warn!("[tier]: forget {key:?} after a failed storage operation");
        }
    }

    /// Put back a victim whose eviction is abandoned. Returns the victim if the storage rejects it.
    fn restore(&self, entry: CacheEntry<K, V>) -> Option<CacheEntry<K, V>> {
        let (key, value) = entry.into_parts();
        match self.storage.put(key.clone(), value.clone()) {
            Ok(_) => {
                self.policy.restore(key);
                None
            }
            Err(e) => {
                tracing::warn!("[tier]: drop victim {key:?}, failed to put it back: {e}");
                Some(CacheEntry::new(key, value))
            }
        }
    }

    fn evict(&self) -> Result<Option<CacheEntry<K, V>>> {
        let Some(key) = self.policy.evict() else {
            return Ok(None);
        };
        match self.storage.remove(&key) {
            Ok(Some(value)) => Ok(Some(CacheEntry::new(key, value))),
            Ok(None) => {
                tracing::warn!("[tier]: victim {key:?} is tracked by the policy but missing in the storage");
                Ok(None)
            }
            Err(e) => {
                if self.storage.contains(&key) {
                    self.policy.touch(key);
                }
                Err(e)
            }
        }
    }
}

/// A capacity bounded cache tier.
///
/// A tier pairs an [`EvictionPolicy`] with a [`Storage`] and keeps them consistent: every key held by
/// the storage is tracked by the policy and vice versa, and the storage never holds more than
/// [`CacheTier::max_size`] entries once an operation returns.
///
/// Both are guarded by one lock that every operation holds for its whole duration.
pub struct CacheTier<K, V>
where
    K: Key,
    V: Value,
{
    name: String,
    max_size: usize,
    kind: EvictionKind,
    inner: Mutex<TierInner<K, V>>,
    statistics: Arc<Statistics>,
    event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,
}

impl<K, V> Debug for CacheTier<K, V>
where
    K: Key,
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheTier")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("max_size", &self.max_size)
            .field("len", &self.len())
            .finish()
    }
}

impl<K, V> CacheTier<K, V>
where
    K: Key,
    V: Value,
{
    /// Create an empty in-memory tier.
    ///
    /// Capacities below [`MIN_TIER_CAPACITY`] are replaced by [`DEFAULT_TIER_CAPACITY`].
    pub fn new(kind: EvictionKind, capacity: usize) -> Self {
        let max_size = if capacity < MIN_TIER_CAPACITY {
            DEFAULT_TIER_CAPACITY
        } else {
            capacity
        };
        Self::from_parts(
            "tier".to_string(),
            kind,
            max_size,
            Arc::new(MemoryStorage::new()),
            None,
        )
    }

    fn from_parts(
        name: String,
        kind: EvictionKind,
        max_size: usize,
        storage: Arc<dyn Storage<K, V>>,
        event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,
    ) -> Self {
        Self {
            name,
            max_size,
            kind,
            inner: Mutex::new(TierInner {
                policy: EvictionPolicy::new(kind),
                storage,
            }),
            statistics: Arc::default(),
            event_listener,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TierInner<K, V>> {
        let inner = self.inner.lock();
        strict_assert!(inner.storage.len() <= self.max_size);
        inner
    }

    fn notify(&self, event: Event, entry: &CacheEntry<K, V>) {
        if let Some(listener) = self.event_listener.as_ref() {
            listener.on_leave(event, &entry.key, &entry.value);
        }
    }

    /// Insert or overwrite the entry.
    ///
    /// If the key is new and the tier is full, one entry is evicted first. Returns the evicted entry,
    /// or the previous entry of the key on overwrite, or `None`.
    pub fn put(&self, key: K, value: V) -> Result<Option<CacheEntry<K, V>>> {
        match self.put_inner(key, value, true)? {
            PutOutcome::Inserted | PutOutcome::Kept => Ok(None),
            PutOutcome::Replaced(entry) | PutOutcome::Evicted(entry) => Ok(Some(entry)),
        }
    }

    pub(crate) fn put_inner(&self, key: K, value: V, overwrite: bool) -> Result<PutOutcome<K, V>> {
        let outcome = {
            let inner = self.lock();

            let present = inner.storage.contains(&key);
            if present && !overwrite {
                return Ok(PutOutcome::Kept);
            }

            let evicted = if !present && inner.storage.len() >= self.max_size {
                inner.evict()?
            } else {
                None
            };

            let previous = match inner.storage.put(key.clone(), value) {
                Ok(previous) => previous,
                Err(e) => {
                    inner.reconcile(&key);
                    let dropped = evicted.and_then(|entry| inner.restore(entry));
                    drop(inner);
                    if let Some(entry) = dropped.as_ref() {
                        self.statistics.record_eviction();
                        self.notify(Event::Evict, entry);
                    }
                    return Err(e);
                }
            };
            if let Some(entry) = evicted.as_ref() {
                tracing::debug!("[tier]: {} evicts {:?} to make room for {key:?}", self.name, entry.key);
                self.statistics.record_eviction();
            }
            inner.policy.touch(key.clone());
            strict_assert!(inner.storage.len() <= self.max_size);
            strict_assert!(inner.policy.len() == inner.storage.len());

            match (previous, evicted) {
                (Some(previous), _) => {
                    self.statistics.record_replace();
                    PutOutcome::Replaced(CacheEntry::new(key, previous))
                }
                (None, Some(evicted)) => {
                    self.statistics.record_insert();
                    PutOutcome::Evicted(evicted)
                }
                (None, None) => {
                    self.statistics.record_insert();
                    PutOutcome::Inserted
                }
            }
        };

        match &outcome {
            PutOutcome::Replaced(entry) => self.notify(Event::Replace, entry),
            PutOutcome::Evicted(entry) => self.notify(Event::Evict, entry),
            PutOutcome::Inserted | PutOutcome::Kept => {}
        }

        Ok(outcome)
    }

    /// Get the value of the key and mark it as accessed.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let inner = self.lock();
        match inner.storage.get(key)? {
            Some(value) => {
                inner.policy.touch(key.clone());
                self.statistics.record_hit();
                Ok(Some(value))
            }
            None => {
                self.statistics.record_miss();
                Ok(None)
            }
        }
    }

    /// Returns `true` if the tier holds the key. The access order is not changed.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().storage.contains(key)
    }

    /// Remove the entry and return its value. Deleting an absent key returns `None`.
    pub fn delete(&self, key: &K) -> Result<Option<V>> {
        let value = self.take(key)?;
        if let Some(value) = value.as_ref() {
            self.statistics.record_remove();
            if let Some(listener) = self.event_listener.as_ref() {
                listener.on_leave(Event::Remove, key, value);
            }
        }
        Ok(value)
    }

    /// Remove the entry without recording a removal, used to move entries between tiers.
    pub(crate) fn take(&self, key: &K) -> Result<Option<V>> {
        let inner = self.lock();
        match inner.storage.remove(key) {
            Ok(value) => {
                inner.policy.forget(key);
                strict_assert!(inner.policy.len() == inner.storage.len());
                Ok(value)
            }
            Err(e) => {
                inner.reconcile(key);
                Err(e)
            }
        }
    }

    /// Evict one entry chosen by the eviction policy.
    pub fn evict_one(&self) -> Result<Option<CacheEntry<K, V>>> {
        let evicted = self.lock().evict()?;
        if let Some(entry) = evicted.as_ref() {
            tracing::debug!("[tier]: {} evicts {:?}", self.name, entry.key);
            self.statistics.record_eviction();
            self.notify(Event::Evict, entry);
        }
        Ok(evicted)
    }

    /// Remove all entries.
    pub fn clear(&self) -> Result<()> {
        self.clear_inner(false).map(|_| ())
    }

    /// Remove all entries, returning them if `collect` is set.
    pub(crate) fn clear_inner(&self, collect: bool) -> Result<Vec<CacheEntry<K, V>>> {
        let collect = collect || self.event_listener.is_some();

        let entries = {
            let inner = self.lock();

            let mut entries = vec![];
            if collect {
                for key in inner.policy.keys() {
                    if let Some(value) = inner.storage.get(&key)? {
                        entries.push(CacheEntry::new(key, value));
                    }
                }
            }

            if let Err(e) = inner.storage.clear() {
                for key in inner.policy.keys() {
                    inner.reconcile(&key);
                }
                return Err(e);
            }
            inner.policy.clear();
            entries
        };

        for entry in entries.iter() {
            self.notify(Event::Clear, entry);
        }
        Ok(entries)
    }

    /// Keys held by the tier, from the next victim of an LRU tier to the next victim of an MRU tier.
    pub fn keys(&self) -> Vec<K> {
        self.lock().policy.keys()
    }

    /// Count of entries.
    pub fn len(&self) -> usize {
        self.lock().storage.len()
    }

    /// Returns `true` if the tier holds no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if an insertion of a new key would evict an entry.
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_size
    }

    /// Capacity of the tier in entries.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Eviction kind of the tier.
    pub fn kind(&self) -> EvictionKind {
        self.kind
    }

    /// Name of the tier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operation counters of the tier.
    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.statistics
    }
}

/// Cache tier builder.
pub struct CacheTierBuilder<K, V>
where
    K: Key,
    V: Value,
{
    name: String,
    capacity: usize,
    fallback_capacity: usize,
    eviction: EvictionKind,
    storage: Option<Arc<dyn Storage<K, V>>>,
    seed: Vec<(K, V)>,
    event_listener: Option<Arc<dyn EventListener<Key = K, Value = V>>>,
}

impl<K, V> CacheTierBuilder<K, V>
where
    K: Key,
    V: Value,
{
    /// Create a cache tier builder with the capacity in entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            name: "tier".to_string(),
            capacity,
            fallback_capacity: DEFAULT_TIER_CAPACITY,
            eviction: EvictionKind::default(),
            storage: None,
            seed: vec![],
            event_listener: None,
        }
    }

    /// Set the name of the tier. The name is used in logs.
    ///
    /// Default: `tier`.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the eviction algorithm of the tier.
    ///
    /// Default: [`EvictionKind::Lru`].
    pub fn with_eviction(mut self, eviction: EvictionKind) -> Self {
        self.eviction = eviction;
        self
    }

    /// Set the storage backend of the tier.
    ///
    /// Entries the storage already holds are adopted by the tier, before the seed and in no particular
    /// order.
    ///
    /// Default: an empty [`MemoryStorage`].
    pub fn with_storage(mut self, storage: Arc<dyn Storage<K, V>>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set entries to insert on build, from the least recently used one to the most recently used one.
    ///
    /// The capacity of the tier grows to hold all of them if needed.
    ///
    /// Default: no seed.
    pub fn with_seed(mut self, seed: impl IntoIterator<Item = (K, V)>) -> Self {
        self.seed = seed.into_iter().collect();
        self
    }

    /// Set the capacity used when the requested one is below [`MIN_TIER_CAPACITY`].
    ///
    /// Values below [`MIN_TIER_CAPACITY`] are raised to it.
    ///
    /// Default: [`DEFAULT_TIER_CAPACITY`].
    pub fn with_fallback_capacity(mut self, fallback_capacity: usize) -> Self {
        self.fallback_capacity = fallback_capacity.max(MIN_TIER_CAPACITY);
        self
    }

    /// Set event listener.
    ///
    /// Default: No event listener installed.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Key = K, Value = V>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Build the cache tier.
    pub fn build(self) -> Result<CacheTier<K, V>> {
        let requested = if self.capacity < MIN_TIER_CAPACITY {
            tracing::debug!(
                "[tier]: capacity {} of {} is below {MIN_TIER_CAPACITY}, use {}",
                self.capacity,
                self.name,
                self.fallback_capacity
            );
            self.fallback_capacity
        } else {
            self.capacity
        };

        let storage = self.storage.unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let policy = EvictionPolicy::with_capacity(self.eviction, requested);

        let adopted = storage.keys();
        for key in adopted.iter() {
            policy.touch(key.clone());
        }
        for (key, value) in self.seed {
            storage.put(key.clone(), value)?;
            policy.touch(key);
        }
        let max_size = requested.max(storage.len());
        strict_assert!(policy.len() == storage.len());

        tracing::info!(
            "[tier]: build {} tier {} with capacity {max_size}, {} adopted entries, {} entries in total",
            self.eviction,
            self.name,
            adopted.len(),
            storage.len()
        );

        Ok(CacheTier {
            name: self.name,
            max_size,
            kind: self.eviction,
            inner: Mutex::new(TierInner { policy, storage }),
            statistics: Arc::default(),
            event_listener: self.event_listener,
        })
    }
}
