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

//! Multi-threaded bench tool for strata cache hierarchies.

mod report;

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use hdrhistogram::Histogram;
use itertools::Itertools;
use rand::{distr::Distribution, rngs::StdRng, Rng, SeedableRng};
use rand_distr::Zipf;
use strata::{
    CacheHierarchy, CacheHierarchyBuilder, CacheTierBuilder, Event, EventListener, EvictionKind, FileStorage,
};

use crate::report::Report;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Memory tiers from the innermost one, as `<eviction>:<capacity>` separated by commas.
    #[arg(long, value_delimiter = ',', default_value = "lru:1000,mru:4000")]
    tiers: Vec<TierSpec>,

    /// Capacity of an extra file backed tier appended below the memory tiers. (entries)
    #[arg(long)]
    file_tier: Option<usize>,

    /// Directory of the file backed tier. A temporary directory is used if not set.
    #[arg(long)]
    dir: Option<String>,

    /// Worker thread count.
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Operations per worker.
    #[arg(long, default_value_t = 100_000)]
    ops: usize,

    /// Key space size.
    #[arg(long, default_value_t = 20_000)]
    keys: u64,

    /// Key distribution.
    #[arg(long, value_enum, default_value_t = KeyDistribution::Zipf)]
    distribution: KeyDistribution,

    /// Exponent of the zipf distribution.
    #[arg(long, default_value_t = 1.0)]
    zipf_s: f64,

    /// Ratio of reads among operations. A read miss inserts the key.
    #[arg(long, default_value_t = 0.8)]
    read_ratio: f64,

    /// Value size. (B)
    #[arg(long, default_value_t = 64)]
    value_size: usize,

    /// Seed of the workers' random generators.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Eviction kind and capacity of a memory tier.
#[derive(Debug, Clone, Copy)]
pub struct TierSpec {
    eviction: EvictionKind,
    capacity: usize,
}

impl FromStr for TierSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (eviction, capacity) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("tier must be `<eviction>:<capacity>`, given: {s}"))?;
        Ok(Self {
            eviction: eviction.parse()?,
            capacity: capacity.trim().parse().with_context(|| format!("invalid capacity: {capacity}"))?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KeyDistribution {
    Zipf,
    Uniform,
}

enum KeySampler {
    Zipf(Zipf<f64>),
    Uniform(u64),
}

impl KeySampler {
    fn new(args: &Args) -> anyhow::Result<Self> {
        match args.distribution {
            KeyDistribution::Zipf => Ok(Self::Zipf(
                Zipf::new(args.keys as f64, args.zipf_s).map_err(|e| anyhow!("invalid zipf distribution: {e}"))?,
            )),
            KeyDistribution::Uniform => Ok(Self::Uniform(args.keys)),
        }
    }

    fn sample(&self, rng: &mut impl Rng) -> u64 {
        match self {
            // Zipf samples lie in `[1, n]`.
            Self::Zipf(zipf) => zipf.sample(rng) as u64 - 1,
            Self::Uniform(n) => rng.random_range(0..*n),
        }
    }
}

#[derive(Debug, Default)]
struct ExpelCounter(AtomicU64);

impl EventListener for ExpelCounter {
    type Key = u64;
    type Value = Vec<u8>;

    fn on_leave(&self, reason: Event, _: &u64, _: &Vec<u8>) {
        if reason == Event::Expel {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Latencies of one worker, in nanoseconds.
struct WorkerStats {
    gets: Histogram<u64>,
    puts: Histogram<u64>,
    hits: u64,
    misses: u64,
}

impl WorkerStats {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            gets: Histogram::new_with_bounds(1, Duration::from_secs(60).as_nanos() as u64, 3)?,
            puts: Histogram::new_with_bounds(1, Duration::from_secs(60).as_nanos() as u64, 3)?,
            hits: 0,
            misses: 0,
        })
    }
}

fn build_hierarchy(args: &Args, listener: Arc<ExpelCounter>) -> anyhow::Result<CacheHierarchy<u64, Vec<u8>>> {
    let mut builder = CacheHierarchyBuilder::<u64, Vec<u8>>::new().with_event_listener(listener);
    for (index, spec) in args.tiers.iter().enumerate() {
        let tier = CacheTierBuilder::new(spec.capacity)
            .with_name(&format!("memory-{index}"))
            .with_eviction(spec.eviction)
            .build()?;
        builder = builder.with_tier(tier);
    }
    let mut hierarchy = builder.build();

    if let Some(capacity) = args.file_tier {
        let storage = match args.dir.as_ref() {
            Some(dir) => FileStorage::<u64, Vec<u8>>::open(dir)?,
            None => FileStorage::<u64, Vec<u8>>::temp()?,
        };
        let tier = CacheTierBuilder::<u64, Vec<u8>>::new(capacity)
            .with_name("file")
            .with_storage(Arc::new(storage))
            .build()?;
        hierarchy.add_tier(tier);
    }

    Ok(hierarchy)
}

fn run_worker(
    id: usize,
    args: &Args,
    hierarchy: &CacheHierarchy<u64, Vec<u8>>,
    sampler: &KeySampler,
) -> anyhow::Result<WorkerStats> {
    let mut rng = StdRng::seed_from_u64(args.seed + id as u64);
    let mut stats = WorkerStats::new()?;
    let value = vec![id as u8; args.value_size];

    for _ in 0..args.ops {
        let key = sampler.sample(&mut rng);

        if rng.random_bool(args.read_ratio) {
            let now = Instant::now();
            let hit = hierarchy.get(&key)?.is_some();
            stats.gets.record(now.elapsed().as_nanos() as u64)?;
            if hit {
                stats.hits += 1;
                continue;
            }
            stats.misses += 1;
        }

        let now = Instant::now();
        hierarchy.put(key, value.clone())?;
        stats.puts.record(now.elapsed().as_nanos() as u64)?;
    }

    Ok(stats)
}

fn init_logger() {
    use tracing_subscriber::{prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_line_number(true))
        .with(EnvFilter::from_default_env())
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.read_ratio) {
        return Err(anyhow!("read ratio must be in [0, 1], given: {}", args.read_ratio));
    }
    tracing::info!("strata bench args: {args:#?}");

    let listener = Arc::new(ExpelCounter::default());
    let hierarchy = Arc::new(build_hierarchy(&args, listener.clone())?);
    let sampler = Arc::new(KeySampler::new(&args)?);
    let args = Arc::new(args);

    let start = Instant::now();
    let handles = (0..args.threads)
        .map(|id| {
            let args = args.clone();
            let hierarchy = hierarchy.clone();
            let sampler = sampler.clone();
            thread::spawn(move || run_worker(id, &args, &hierarchy, &sampler))
        })
        .collect_vec();

    let mut report = Report::new()?;
    for handle in handles {
        let stats = handle.join().map_err(|_| anyhow!("bench worker panicked"))??;
        report.gets.add(&stats.gets)?;
        report.puts.add(&stats.puts)?;
        report.hits += stats.hits;
        report.misses += stats.misses;
    }
    report.elapsed = start.elapsed();
    report.expelled = listener.0.load(Ordering::Relaxed);
    report.tiers = hierarchy
        .tiers()
        .iter()
        .map(|tier| (tier.name().to_string(), tier.kind(), tier.len(), tier.max_size()))
        .collect();

    println!("{report}");

    Ok(())
}
