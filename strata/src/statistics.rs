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

use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters of a cache tier.
///
/// Counters are updated with relaxed atomics and are only accurate once the tier is quiescent.
#[derive(Debug, Default)]
pub struct Statistics {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    replaces: AtomicU64,
    evictions: AtomicU64,
    removes: AtomicU64,
}

impl Statistics {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_replace(&self) {
        self.replaces.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a plain copy of the counters.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            replaces: self.replaces.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`Statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    /// Lookups that found the key.
    pub hits: u64,
    /// Lookups that missed the key.
    pub misses: u64,
    /// Insertions of new keys.
    pub inserts: u64,
    /// Insertions that overwrote an existing key.
    pub replaces: u64,
    /// Entries evicted by the eviction policy.
    pub evictions: u64,
    /// Entries removed explicitly.
    pub removes: u64,
}

impl StatisticsSnapshot {
    /// Ratio of hits to lookups, `0.0` if there was no lookup.
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }

    /// Counter-wise sum of two snapshots.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            inserts: self.inserts + other.inserts,
            replaces: self.replaces + other.replaces,
            evictions: self.evictions + other.evictions,
            removes: self.removes + other.removes,
        }
    }
}
