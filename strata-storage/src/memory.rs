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

use hashbrown::HashMap;
use parking_lot::RwLock;
use strata_common::{
    code::{Key, Value},
    error::Result,
};

use crate::storage::Storage;

/// In-memory storage backed by a hash map.
pub struct MemoryStorage<K, V>
where
    K: Key,
    V: Value,
{
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Debug for MemoryStorage<K, V>
where
    K: Key,
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage").field("len", &self.len()).finish()
    }
}

impl<K, V> Default for MemoryStorage<K, V>
where
    K: Key,
    V: Value,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MemoryStorage<K, V>
where
    K: Key,
    V: Value,
{
    /// Create an empty memory storage.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Create an empty memory storage with room for `capacity` entries before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }
}

impl<K, V> Storage<K, V> for MemoryStorage<K, V>
where
    K: Key,
    V: Value,
{
    fn put(&self, key: K, value: V) -> Result<Option<V>> {
        Ok(self.inner.write().insert(key, value))
    }

    fn get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn contains(&self, key: &K) -> bool {
        self.inner.read().contains_key(key)
    }

    fn remove(&self, key: &K) -> Result<Option<V>> {
        Ok(self.inner.write().remove(key))
    }

    fn clear(&self) -> Result<()> {
        self.inner.write().clear();
        Ok(())
    }

    fn keys(&self) -> Vec<K> {
        self.inner.read().keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.inner.read().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use itertools::Itertools;

    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<MemoryStorage<u64, String>>();
        is_send_sync_static::<Arc<dyn Storage<u64, String>>>();
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::with_capacity(4);
        assert!(storage.is_empty());

        assert_eq!(storage.put(1, "one".to_string()).unwrap(), None);
        assert_eq!(storage.put(2, "two".to_string()).unwrap(), None);
        assert_eq!(storage.put(1, "uno".to_string()).unwrap(), Some("one".to_string()));
        assert_eq!(storage.len(), 2);

        assert_eq!(storage.get(&1).unwrap(), Some("uno".to_string()));
        assert_eq!(storage.get(&3).unwrap(), None);
        assert!(storage.contains(&2));
        assert_eq!(storage.keys().into_iter().sorted().collect_vec(), vec![1, 2]);

        assert_eq!(storage.remove(&2).unwrap(), Some("two".to_string()));
        assert_eq!(storage.remove(&2).unwrap(), None);

        storage.clear().unwrap();
        assert!(storage.is_empty());
        assert_eq!(format!("{storage:?}"), "MemoryStorage { len: 0 }");
    }
}
