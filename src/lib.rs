//! # EsoxSolutions.ResourcePool
//!
//! Thread-safe, rate-limited access to a fixed set of interchangeable
//! resources such as API keys, outbound addresses or accounts.
//!
//! ## Features
//!
//! - Per-resource token bucket with shared rate, capacity and batch size
//! - Round-robin or random candidate selection
//! - Cooldowns ("resting") for individual resources or the whole pool
//! - Per-resource usage and failure counters
//! - Hot replacement of the resource list
//! - Health monitoring and metrics
//! - Prometheus metrics export
//!
//! Acquisition never blocks and never queues: a denied caller gets an error
//! describing why and decides for itself when to try again.
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{ResourcePool, SelectionPolicy};
//!
//! // 10 units per second, bucket of 3, one unit per acquisition
//! let keys = vec!["key-a", "key-b"];
//! let pool = ResourcePool::from_frequency(keys, "10,3", SelectionPolicy::RoundRobin)
//!     .expect("valid frequency");
//!
//! match pool.acquire() {
//!     Ok(acquired) => {
//!         println!("Using {}", acquired.resource);
//!         pool.record_outcome(false, acquired.index);
//!     }
//!     Err(denied) => println!("Try again later: {denied}"),
//! }
//! ```

mod pool;
mod config;
mod entry;
mod limiter;
mod metrics;
mod health;
mod errors;

pub use pool::{ResourcePool, Acquired, MAX_REST};
pub use config::{PoolConfiguration, SelectionPolicy};
pub use entry::EntrySnapshot;
pub use limiter::{Admission, TokenBucket};
pub use metrics::PoolMetrics;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use health::HealthStatus;
pub use errors::{PoolError, PoolResult};
