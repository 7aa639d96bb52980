//! locmem Load Generator
//!
//! Hammers one named in-memory store from many threads and reports
//! throughput, latency and cache statistics.

use clap::Parser;
use locmem::cache::{CacheConfig, LocMemCache};
use locmem::loadtest::{run_load, LoadTestConfig};
use locmem::storage::CacheRegistry;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// locmem bench - concurrent load against an in-memory cache
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Store name
    #[arg(short, long, default_value = "bench")]
    location: String,

    /// Worker threads (0 = auto-detect based on CPU cores)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Operations per worker thread
    #[arg(short, long, default_value_t = 100_000)]
    ops: u64,

    /// Number of distinct keys
    #[arg(long, default_value_t = 1_000)]
    key_space: usize,

    /// Percentage of writes
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u8).range(0..=100))]
    write_percent: u8,

    /// Percentage of counter increments
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=100))]
    incr_percent: u8,

    /// Entry count that triggers culling
    #[arg(long, default_value_t = 300)]
    max_entries: usize,

    /// Cull 1/N of the entries per pass (0 = clear the store)
    #[arg(long, default_value_t = 3)]
    cull_frequency: usize,

    /// Default timeout in seconds
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Entries never expire
    #[arg(long)]
    no_expiry: bool,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("locmem=info".parse()?))
        .init();

    let args = Args::parse();

    let default_timeout = if args.no_expiry {
        None
    } else {
        Some(Duration::from_secs(args.timeout))
    };
    let config = CacheConfig::default()
        .with_location(&args.location)
        .with_max_entries(args.max_entries)
        .with_cull_frequency(args.cull_frequency)
        .with_default_timeout(default_timeout);

    let registry = CacheRegistry::new();
    let cache = LocMemCache::new(&registry, config);

    let load = LoadTestConfig {
        threads: args.threads,
        ops_per_thread: args.ops,
        key_space: args.key_space,
        write_percent: args.write_percent,
        incr_percent: args.incr_percent,
    };

    info!(
        "Running {} ops on {} threads against store {:?} (max_entries={}, cull_frequency={})",
        args.ops,
        load.effective_threads(),
        args.location,
        args.max_entries,
        args.cull_frequency
    );

    let stats = run_load(&cache, &load)?;

    println!("{}", stats.report());
    println!("{}", cache.metrics().summary());
    println!("Entries: {}", cache.len());

    Ok(())
}
