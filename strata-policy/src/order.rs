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
use parking_lot::Mutex;
use strata_common::{
    code::Key,
    slab::{Slab, Token},
    strict_assert, strict_assert_eq,
};

#[derive(Debug)]
struct Node<E> {
    elem: E,
    prev: Option<Token>,
    next: Option<Token>,
}

/// Doubly linked list threaded through a slab, indexed by element.
///
/// `head` is the least recently touched element, `tail` the most recently touched one.
#[derive(Debug)]
struct OrderList<E>
where
    E: Key,
{
    slab: Slab<Node<E>>,
    index: HashMap<E, Token>,
    head: Option<Token>,
    tail: Option<Token>,
}

impl<E> OrderList<E>
where
    E: Key,
{
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slab: Slab::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    fn node(&self, token: Token) -> &Node<E> {
        match self.slab.get(token) {
            Some(node) => node,
            None => unreachable!("dangling token {token:?} in access order list"),
        }
    }

    fn node_mut(&mut self, token: Token) -> &mut Node<E> {
        match self.slab.get_mut(token) {
            Some(node) => node,
            None => unreachable!("dangling token {token:?} in access order list"),
        }
    }

    /// Link a detached node at the tail.
    fn link_back(&mut self, token: Token) {
        let tail = self.tail;
        {
            let node = self.node_mut(token);
            node.prev = tail;
            node.next = None;
        }
        match tail {
            Some(t) => self.node_mut(t).next = Some(token),
            None => self.head = Some(token),
        }
        self.tail = Some(token);
    }

    /// Link a detached node at the head.
    fn link_front(&mut self, token: Token) {
        let head = self.head;
        {
            let node = self.node_mut(token);
            node.prev = None;
            node.next = head;
        }
        match head {
            Some(h) => self.node_mut(h).prev = Some(token),
            None => self.tail = Some(token),
        }
        self.head = Some(token);
    }

    /// Detach a node from its neighbors. The node stays in the slab.
    fn unlink(&mut self, token: Token) {
        let (prev, next) = {
            let node = self.node_mut(token);
            (node.prev.take(), node.next.take())
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }

    fn touch(&mut self, elem: E) -> bool {
        if let Some(&token) = self.index.get(&elem) {
            if self.tail != Some(token) {
                self.unlink(token);
                self.link_back(token);
            }
            return true;
        }

        let token = self.slab.insert(Node {
            elem: elem.clone(),
            prev: None,
            next: None,
        });
        self.link_back(token);
        self.index.insert(elem, token);
        false
    }

    fn touch_first(&mut self, elem: E) -> bool {
        if let Some(&token) = self.index.get(&elem) {
            if self.head != Some(token) {
                self.unlink(token);
                self.link_front(token);
            }
            return true;
        }

        let token = self.slab.insert(Node {
            elem: elem.clone(),
            prev: None,
            next: None,
        });
        self.link_front(token);
        self.index.insert(elem, token);
        false
    }

    fn detach(&mut self, token: Token) -> E {
        self.unlink(token);
        let node = match self.slab.remove(token) {
            Some(node) => node,
            None => unreachable!("dangling token {token:?} in access order list"),
        };
        let removed = self.index.remove(&node.elem);
        strict_assert_eq!(removed, Some(token));
        node.elem
    }

    fn remove(&mut self, elem: &E) -> bool {
        match self.index.get(elem) {
            Some(&token) => {
                self.detach(token);
                true
            }
            None => false,
        }
    }

    fn cut_first(&mut self) -> Option<E> {
        let token = self.head?;
        Some(self.detach(token))
    }

    fn cut_last(&mut self) -> Option<E> {
        let token = self.tail?;
        Some(self.detach(token))
    }

    fn clear(&mut self) {
        self.slab.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    fn to_vec(&self) -> Vec<E> {
        let mut res = Vec::with_capacity(self.index.len());
        let mut cursor = self.head;
        while let Some(token) = cursor {
            let node = self.node(token);
            res.push(node.elem.clone());
            cursor = node.next;
        }
        strict_assert_eq!(res.len(), self.index.len());
        res
    }

    fn len(&self) -> usize {
        strict_assert_eq!(self.slab.len(), self.index.len());
        strict_assert!(self.index.is_empty() == self.head.is_none());
        strict_assert!(self.head.is_none() == self.tail.is_none());
        self.index.len()
    }
}

/// A thread-safe set of elements ordered by their last access.
///
/// Every operation runs in O(1) under a single lock scope. The set keeps its link records in a slab
/// arena, so no element is ever addressed by a raw pointer.
pub struct AccessOrderedSet<E>
where
    E: Key,
{
    inner: Mutex<OrderList<E>>,
}

impl<E> Debug for AccessOrderedSet<E>
where
    E: Key,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessOrderedSet").field("len", &self.len()).finish()
    }
}

impl<E> Default for AccessOrderedSet<E>
where
    E: Key,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> AccessOrderedSet<E>
where
    E: Key,
{
    /// Create an empty set.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty set with room for `capacity` elements before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(OrderList::with_capacity(capacity)),
        }
    }

    /// Insert the element as the most recently accessed one, or move it there if it is present.
    ///
    /// Returns `true` if the element was already in the set.
    pub fn touch(&self, elem: E) -> bool {
        self.inner.lock().touch(elem)
    }

    /// Insert the element as the least recently accessed one, or move it there if it is present.
    ///
    /// Returns `true` if the element was already in the set.
    pub fn touch_first(&self, elem: E) -> bool {
        self.inner.lock().touch_first(elem)
    }

    /// Remove the element. Returns `true` if it was present.
    pub fn remove(&self, elem: &E) -> bool {
        self.inner.lock().remove(elem)
    }

    /// Remove and return the least recently accessed element.
    pub fn cut_first(&self) -> Option<E> {
        self.inner.lock().cut_first()
    }

    /// Remove and return the most recently accessed element.
    pub fn cut_last(&self) -> Option<E> {
        self.inner.lock().cut_last()
    }

    /// Returns `true` if the element is in the set.
    pub fn contains(&self, elem: &E) -> bool {
        self.inner.lock().index.contains_key(elem)
    }

    /// Count of elements.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if the set holds no element.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all elements.
    pub fn clear(&self) {
        self.inner.lock().clear()
    }

    /// Snapshot of the elements from the least recently accessed to the most recently accessed.
    pub fn to_vec(&self) -> Vec<E> {
        self.inner.lock().to_vec()
    }
}
