//! Basic usage examples for ResourcePool

use esox_resourcepool::{PoolConfiguration, ResourcePool, SelectionPolicy};
use std::time::{Duration, Instant};

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Round-robin over API keys
    round_robin();

    // Example 2: Random selection
    random_selection();

    // Example 3: Cooldowns
    cooldowns();

    // Example 4: Metrics and health
    metrics_and_health();
}

fn round_robin() {
    println!("1. Round Robin:");
    let pool = ResourcePool::new(
        vec!["key-a", "key-b", "key-c"],
        PoolConfiguration::new().with_rate(100).with_capacity(10),
    )
    .expect("valid configuration");

    for _ in 0..4 {
        if let Some(acquired) = pool.try_acquire() {
            println!("   Got {} (index {})", acquired.resource, acquired.index);
        }
    }
    println!();
}

fn random_selection() {
    println!("2. Random Selection:");
    let pool = ResourcePool::from_frequency(
        vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"],
        "5,2",
        SelectionPolicy::Random,
    )
    .expect("valid frequency");

    for _ in 0..6 {
        match pool.acquire() {
            Ok(acquired) => println!("   Got {}", acquired.resource),
            Err(denied) => println!("   Denied: {}", denied),
        }
    }
    println!();
}

fn cooldowns() {
    println!("3. Cooldowns:");
    let accounts = vec!["account-1", "account-2"];
    let pool = ResourcePool::new(accounts, PoolConfiguration::new().with_capacity(5))
        .expect("valid configuration");

    // account-1 is retired until further notice
    pool.rest_for(0, Duration::MAX);
    println!("   account-1 resting: {}", pool.entry(0).is_some_and(|e| e.is_resting()));
    pool.clear_cooldowns();

    // account-2 hit an upstream quota
    pool.rest_for(1, Duration::from_millis(50));

    for _ in 0..4 {
        match pool.acquire() {
            Ok(acquired) => println!("   Got {}", acquired.resource),
            Err(denied) => println!("   Denied: {}", denied),
        }
    }

    pool.rest_all(Instant::now() + Duration::from_secs(1));
    println!("   After rest_all: {:?}", pool.try_acquire().map(|a| a.resource));
    pool.clear_cooldowns();
    println!("   After clear_cooldowns: {:?}\n", pool.try_acquire().map(|a| a.resource));
}

fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let pool = ResourcePool::new(vec![1, 2, 3, 4, 5], PoolConfiguration::default())
        .expect("valid configuration");

    for _ in 0..8 {
        if let Ok(acquired) = pool.acquire() {
            pool.record_outcome(false, acquired.index);
        }
    }
    pool.rest_for(0, Duration::from_secs(30));

    let health = pool.get_health_status();
    println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
    println!("   Resting: {:.1}%", health.resting_ratio * 100.0);
    println!("   Available: {}, Resting: {}", health.available_entries, health.resting_entries);

    println!("\n   Prometheus:");
    print!("{}", pool.export_metrics_prometheus("demo", None));
}
