// EsoxSolutions.ResourcePool
// Demo: three resources sharing a "rate,capacity,batch" frequency, one of
// them resting for the first few milliseconds.
//
// Usage: esox_resourcepool [frequency]   (default "100,2,2")
// Set RUST_LOG=debug to see every denial.

use esox_resourcepool::{ResourcePool, SelectionPolicy};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let frequency = std::env::args().nth(1).unwrap_or_else(|| "100,2,2".to_string());
    let pool = match ResourcePool::from_frequency(
        vec!["7.999", "2", "A"],
        &frequency,
        SelectionPolicy::RoundRobin,
    ) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "cannot build resource pool");
            return ExitCode::FAILURE;
        }
    };

    pool.rest_for(1, Duration::from_millis(2));

    for _ in 0..100 {
        match pool.acquire() {
            Ok(acquired) => {
                println!("ok    index={} resource={}", acquired.index, acquired.resource);
                pool.record_outcome(false, acquired.index);
            }
            Err(denied) => println!("deny  {denied}"),
        }
        std::thread::sleep(Duration::from_millis(3));
    }

    println!();
    for (index, entry) in pool.entries().iter().enumerate() {
        println!(
            "entry {index}: resource={} used={} failed={}",
            entry.resource, entry.used, entry.failed
        );
    }
    for (key, value) in pool.export_metrics() {
        println!("{key}: {value}");
    }

    ExitCode::SUCCESS
}
