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

pub use strata_common::{
    code::{Key, StorageKey, StorageValue, Value},
    error::{Error, ErrorKind, Result},
    event::{Event, EventListener},
};
pub use strata_policy::{AccessOrderedSet, EvictionKind, EvictionPolicy};
pub use strata_storage::{FileStorage, MemoryStorage, Storage};

pub use crate::{
    entry::CacheEntry,
    hierarchy::{CacheHierarchy, CacheHierarchyBuilder},
    statistics::{Statistics, StatisticsSnapshot},
    tier::{CacheTier, CacheTierBuilder, DEFAULT_TIER_CAPACITY, MIN_TIER_CAPACITY},
};
