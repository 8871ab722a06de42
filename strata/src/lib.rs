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

//! strata is an in-process multi-tier cache.
//!
//! A [`CacheTier`] bounds one storage backend by entry count and evicts with an LRU or MRU policy. A
//! [`CacheHierarchy`] chains tiers: hot entries are promoted toward tier 0, cold entries are demoted
//! toward the last tier, and an entry leaves the hierarchy only when it falls off the last tier.
//!
//! ```
//! use strata::{CacheHierarchyBuilder, CacheTierBuilder, EvictionKind};
//!
//! let hierarchy = CacheHierarchyBuilder::new()
//!     .with_tier(CacheTierBuilder::new(2).build().unwrap())
//!     .with_tier(CacheTierBuilder::new(4).with_eviction(EvictionKind::Mru).build().unwrap())
//!     .build();
//!
//! for i in 0..4u64 {
//!     hierarchy.put(i, i.to_string()).unwrap();
//! }
//! assert_eq!(hierarchy.locate(&0), Some(1));
//! assert_eq!(hierarchy.get(&0).unwrap(), Some("0".to_string()));
//! assert_eq!(hierarchy.locate(&0), Some(0));
//! ```

mod entry;
mod hierarchy;
mod prelude;
mod statistics;
mod tier;

pub use prelude::*;
