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

//! A vector backed arena with stable integer tokens and a free list of vacant slots.

/// Stable handle of a slot in a [`Slab`].
///
/// A token stays valid until the value it addresses is removed. After that the slot may be reused by
/// a later insertion, so holders must drop tokens together with the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(usize);

impl Token {
    /// Index of the slot in the arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
enum Entry<T> {
    Vacant(usize),
    Occupied(T),
}

/// A vector backed arena.
#[derive(Debug, Clone)]
pub struct Slab<T> {
    entries: Vec<Entry<T>>,
    len: usize,
    /// Head of the vacant slot list, `entries.len()` if there is none.
    next: usize,
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slab<T> {
    /// Create an empty slab.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            len: 0,
            next: 0,
        }
    }

    /// Create an empty slab with room for `capacity` values before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            len: 0,
            next: 0,
        }
    }

    /// Insert a value and return its token.
    pub fn insert(&mut self, val: T) -> Token {
        let index = self.next;
        self.len += 1;

        if index == self.entries.len() {
            self.entries.push(Entry::Occupied(val));
            self.next = index + 1;
        } else {
            let entry = std::mem::replace(&mut self.entries[index], Entry::Occupied(val));
            self.next = match entry {
                Entry::Vacant(next) => next,
                Entry::Occupied(_) => unreachable!("vacant list points to an occupied slot"),
            };
        }

        Token(index)
    }

    /// Remove the value addressed by `token`, returns `None` if the slot is vacant.
    pub fn remove(&mut self, token: Token) -> Option<T> {
        let index = token.index();
        let entry = self.entries.get_mut(index)?;

        if matches!(entry, Entry::Vacant(_)) {
            return None;
        }

        match std::mem::replace(entry, Entry::Vacant(self.next)) {
            Entry::Occupied(val) => {
                self.len -= 1;
                self.next = index;
                Some(val)
            }
            Entry::Vacant(_) => unreachable!(),
        }
    }

    /// Get the value addressed by `token`.
    pub fn get(&self, token: Token) -> Option<&T> {
        match self.entries.get(token.index()) {
            Some(Entry::Occupied(val)) => Some(val),
            _ => None,
        }
    }

    /// Get the mutable value addressed by `token`.
    pub fn get_mut(&mut self, token: Token) -> Option<&mut T> {
        match self.entries.get_mut(token.index()) {
            Some(Entry::Occupied(val)) => Some(val),
            _ => None,
        }
    }

    /// Count of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop all values. Tokens handed out before are invalidated.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    #[test]
    fn test_slab_reuse() {
        let mut slab = Slab::new();
        let tokens = (0..4).map(|i| slab.insert(i)).collect_vec();
        assert_eq!(slab.len(), 4);

        assert_eq!(slab.remove(tokens[1]), Some(1));
        assert_eq!(slab.remove(tokens[1]), None);
        assert_eq!(slab.remove(tokens[2]), Some(2));
        assert_eq!(slab.len(), 2);

        // Vacant slots are reused in LIFO order.
        let t = slab.insert(20);
        assert_eq!(t, tokens[2]);
        let t = slab.insert(10);
        assert_eq!(t, tokens[1]);
        let t = slab.insert(4);
        assert_eq!(t.index(), 4);

        assert_eq!(slab.get(tokens[1]), Some(&10));
        *slab.get_mut(tokens[3]).unwrap() = 30;
        assert_eq!(slab.get(tokens[3]), Some(&30));

        slab.clear();
        assert!(slab.is_empty());
        assert_eq!(slab.get(tokens[0]), None);
        assert_eq!(slab.insert(0).index(), 0);
    }
}
