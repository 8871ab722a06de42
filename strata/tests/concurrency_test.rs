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

//! Multi-threaded tests of tiers and hierarchies.

use std::{collections::HashSet, sync::Arc, thread};

use itertools::Itertools;
use rand::Rng;
use strata::{CacheHierarchy, CacheHierarchyBuilder, CacheTierBuilder, EvictionKind};

const THREADS: u64 = 8;

#[test_log::test]
fn test_tier_stays_full_under_concurrent_puts() {
    const CAPACITY: usize = 40;
    const PUTS: u64 = 2000;

    for kind in [EvictionKind::Lru, EvictionKind::Mru] {
        let tier = Arc::new(
            CacheTierBuilder::new(CAPACITY)
                .with_eviction(kind)
                .with_seed((0..CAPACITY as u64).map(|i| (i, i)))
                .build()
                .unwrap(),
        );
        assert_eq!(tier.len(), CAPACITY);

        let handles = (0..THREADS)
            .map(|t| {
                let tier = tier.clone();
                thread::spawn(move || {
                    // Disjoint key spaces per thread.
                    let base = 1_000_000 * (t + 1);
                    for i in 0..PUTS {
                        tier.put(base + i, i).unwrap();
                        assert!(tier.len() <= CAPACITY);
                    }
                })
            })
            .collect_vec();
        handles.into_iter().for_each(|h| h.join().unwrap());

        assert_eq!(tier.len(), CAPACITY);
        assert_eq!(tier.keys().len(), CAPACITY);
        assert_eq!(tier.keys().into_iter().unique().count(), CAPACITY);
        let stats = tier.statistics().snapshot();
        assert_eq!(stats.evictions, THREADS * PUTS);
    }
}

fn assert_consistent(hierarchy: &CacheHierarchy<u64, u64>) {
    let mut seen = HashSet::new();
    for tier in hierarchy.tiers() {
        let keys = tier.keys();
        assert!(keys.len() <= tier.max_size(), "tier {} over capacity", tier.name());
        assert_eq!(keys.len(), tier.len());
        for key in keys {
            assert!(seen.insert(key), "key {key} lives in more than one tier");
        }
    }
    assert!(hierarchy.len() <= hierarchy.max_size());
}

#[test_log::test]
fn test_hierarchy_stress() {
    const OPS: usize = 20_000;
    const KEYS: u64 = 512;

    let hierarchy = Arc::new(
        CacheHierarchyBuilder::new()
            .with_tier(CacheTierBuilder::new(16).with_name("l0").build().unwrap())
            .with_tier(
                CacheTierBuilder::new(64)
                    .with_name("l1")
                    .with_eviction(EvictionKind::Mru)
                    .build()
                    .unwrap(),
            )
            .with_tier(CacheTierBuilder::new(128).with_name("l2").build().unwrap())
            .build(),
    );

    let handles = (0..THREADS)
        .map(|_| {
            let hierarchy = hierarchy.clone();
            thread::spawn(move || {
                let mut rng = rand::rng();
                for _ in 0..OPS {
                    let key = rng.random_range(0..KEYS);
                    match rng.random_range(0..10) {
                        0..=4 => {
                            if let Some(value) = hierarchy.get(&key).unwrap() {
                                assert_eq!(value, key * 2);
                            }
                        }
                        5..=7 => {
                            hierarchy.put(key, key * 2).unwrap();
                        }
                        8 => {
                            hierarchy.delete(&key).unwrap();
                        }
                        _ => {
                            hierarchy.pop().unwrap();
                        }
                    }
                }
            })
        })
        .collect_vec();
    handles.into_iter().for_each(|h| h.join().unwrap());

    assert_consistent(&hierarchy);
}
