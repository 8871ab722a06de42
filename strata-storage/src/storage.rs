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

use std::fmt::Debug;

use strata_common::{
    code::{Key, Value},
    error::Result,
};

/// Key-value store backing a cache tier.
///
/// The trait is object safe, tiers hold it as `Arc<dyn Storage<K, V>>` so memory and file backed
/// tiers can be chained in one hierarchy.
pub trait Storage<K, V>: Send + Sync + Debug + 'static
where
    K: Key,
    V: Value,
{
    /// Insert or overwrite the entry, returns the previous value of the key.
    fn put(&self, key: K, value: V) -> Result<Option<V>>;

    /// Get the value of the key.
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Returns `true` if the storage holds the key.
    fn contains(&self, key: &K) -> bool;

    /// Remove the entry, returns its value. Removing an absent key is not an error.
    fn remove(&self, key: &K) -> Result<Option<V>>;

    /// Remove all entries.
    fn clear(&self) -> Result<()>;

    /// Keys of all entries, in no particular order.
    ///
    /// Used to adopt entries that a storage already holds when a tier is built over it.
    fn keys(&self) -> Vec<K>;

    /// Count of entries.
    fn len(&self) -> usize;

    /// Returns `true` if the storage holds no entry.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
