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

use std::{fmt::Display, time::Duration};

use hdrhistogram::Histogram;
use strata::EvictionKind;

/// Aggregated result of a bench run.
pub struct Report {
    pub elapsed: Duration,
    pub gets: Histogram<u64>,
    pub puts: Histogram<u64>,
    pub hits: u64,
    pub misses: u64,
    pub expelled: u64,
    /// Name, eviction, entries and capacity of every tier.
    pub tiers: Vec<(String, EvictionKind, usize, usize)>,
}

impl Report {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            elapsed: Duration::ZERO,
            gets: Histogram::new_with_bounds(1, Duration::from_secs(60).as_nanos() as u64, 3)?,
            puts: Histogram::new_with_bounds(1, Duration::from_secs(60).as_nanos() as u64, 3)?,
            hits: 0,
            misses: 0,
            expelled: 0,
            tiers: vec![],
        })
    }

    fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }
}

fn latency(f: &mut std::fmt::Formatter<'_>, name: &str, histogram: &Histogram<u64>) -> std::fmt::Result {
    if histogram.is_empty() {
        return writeln!(f, "{name:<4} -");
    }
    let us = |v: u64| v as f64 / 1000.0;
    writeln!(
        f,
        "{name:<4} count: {}, mean: {:.3}us, p50: {:.3}us, p90: {:.3}us, p99: {:.3}us, p999: {:.3}us, max: {:.3}us",
        histogram.len(),
        histogram.mean() / 1000.0,
        us(histogram.value_at_quantile(0.5)),
        us(histogram.value_at_quantile(0.9)),
        us(histogram.value_at_quantile(0.99)),
        us(histogram.value_at_quantile(0.999)),
        us(histogram.max()),
    )
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ops = self.gets.len() + self.puts.len();
        writeln!(
            f,
            "elapsed: {:.3}s, ops: {ops}, throughput: {:.0} op/s",
            self.elapsed.as_secs_f64(),
            ops as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
        )?;
        writeln!(
            f,
            "hit ratio: {:.2}% ({} hits, {} misses), expelled: {}",
            self.hit_ratio() * 100.0,
            self.hits,
            self.misses,
            self.expelled
        )?;
        latency(f, "get", &self.gets)?;
        latency(f, "put", &self.puts)?;
        for (index, (name, eviction, len, capacity)) in self.tiers.iter().enumerate() {
            writeln!(f, "tier {index} {name} ({eviction}): {len}/{capacity}")?;
        }
        Ok(())
    }
}
