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

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use strata_common::{code::Key, error::Error};

use crate::order::AccessOrderedSet;

/// Eviction algorithm of a cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionKind {
    /// Least recently used entry is evicted first.
    #[default]
    Lru,
    /// Most recently used entry is evicted first.
    Mru,
}

impl EvictionKind {
    /// Get the static str of the eviction kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lru => "LRU",
            Self::Mru => "MRU",
        }
    }
}

impl Display for EvictionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru),
            "mru" => Ok(Self::Mru),
            _ => Err(Error::invalid_argument("unknown eviction kind").with_context("kind", s)),
        }
    }
}

/// Eviction policy that tracks keys by access order and chooses victims by [`EvictionKind`].
#[derive(Debug)]
pub struct EvictionPolicy<K>
where
    K: Key,
{
    kind: EvictionKind,
    order: AccessOrderedSet<K>,
}

impl<K> EvictionPolicy<K>
where
    K: Key,
{
    /// Create an empty policy of the given kind.
    pub fn new(kind: EvictionKind) -> Self {
        Self::with_capacity(kind, 0)
    }

    /// Create an empty policy of the given kind with room for `capacity` keys before reallocating.
    pub fn with_capacity(kind: EvictionKind, capacity: usize) -> Self {
        Self {
            kind,
            order: AccessOrderedSet::with_capacity(capacity),
        }
    }

    /// Create an empty LRU policy.
    pub fn lru() -> Self {
        Self::new(EvictionKind::Lru)
    }

    /// Create an empty MRU policy.
    pub fn mru() -> Self {
        Self::new(EvictionKind::Mru)
    }

    /// Record an access of the key. Returns `true` if the key was already tracked.
    pub fn touch(&self, key: K) -> bool {
        self.order.touch(key)
    }

    /// Choose a victim, stop tracking it and return it.
    pub fn evict(&self) -> Option<K> {
        match self.kind {
            EvictionKind::Lru => self.order.cut_first(),
            EvictionKind::Mru => self.order.cut_last(),
        }
    }

    /// Track the key again as the next victim. Undoes an [`EvictionPolicy::evict`] whose removal could not
    /// complete.
    pub fn restore(&self, key: K) {
        match self.kind {
            EvictionKind::Lru => self.order.touch_first(key),
            EvictionKind::Mru => self.order.touch(key),
        };
    }

    /// Stop tracking the key. Returns `true` if it was tracked.
    pub fn forget(&self, key: &K) -> bool {
        self.order.remove(key)
    }

    /// Stop tracking all keys.
    pub fn clear(&self) {
        self.order.clear()
    }

    /// Returns `true` if the key is tracked.
    pub fn contains(&self, key: &K) -> bool {
        self.order.contains(key)
    }

    /// Count of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tracked keys from the least recently accessed to the most recently accessed.
    pub fn keys(&self) -> Vec<K> {
        self.order.to_vec()
    }

    /// Eviction kind of the policy.
    pub fn kind(&self) -> EvictionKind {
        self.kind
    }
}
