//! Per-resource bookkeeping

use crate::limiter::Admission;
use std::time::{Duration, Instant};

/// One pooled resource with its limiter, counters and cooldown
#[derive(Debug, Clone)]
pub(crate) struct ResourceEntry<R, L> {
    pub resource: R,
    pub limiter: L,
    pub used: u64,
    pub failed: u64,
    pub rest_until: Option<Instant>,
}

impl<R, L: Admission> ResourceEntry<R, L> {
    pub fn new(resource: R, rate: u32, capacity: u32) -> Self {
        Self {
            resource,
            limiter: L::with_limits(rate, capacity),
            used: 0,
            failed: 0,
            rest_until: None,
        }
    }

    /// Remaining cooldown at `now`, if any
    pub fn resting_remaining(&self, now: Instant) -> Option<Duration> {
        self.rest_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    pub fn reset_stats(&mut self) {
        self.used = 0;
        self.failed = 0;
    }
}

impl<R: Clone, L: Admission> ResourceEntry<R, L> {
    pub fn snapshot(&self, now: Instant) -> EntrySnapshot<R> {
        EntrySnapshot {
            resource: self.resource.clone(),
            available_tokens: self.limiter.available_at(now),
            used: self.used,
            failed: self.failed,
            rest_until: self.rest_until,
        }
    }
}

/// Point-in-time copy of one pool entry
///
/// The copy is taken under the pool lock and goes stale as soon as it is
/// returned. Use it for monitoring, not for coordination.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
///
/// let pool = ResourcePool::new(vec!["key-a", "key-b"], PoolConfiguration::default()).unwrap();
/// pool.record_outcome(false, 1);
///
/// let snapshot = pool.entry(1).unwrap();
/// assert_eq!(snapshot.resource, "key-b");
/// assert_eq!(snapshot.used, 1);
/// assert!(!snapshot.is_resting());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot<R> {
    /// The resource value
    pub resource: R,

    /// Tokens in the resource's bucket at the moment the snapshot was taken
    pub available_tokens: f64,

    /// Outcomes recorded for this resource
    pub used: u64,

    /// Outcomes recorded with the flag set, see `ResourcePool::record_outcome`
    pub failed: u64,

    /// End of the current cooldown, `None` if never rested
    pub rest_until: Option<Instant>,
}

impl<R> EntrySnapshot<R> {
    /// Whether the resource is resting at `now`
    pub fn is_resting_at(&self, now: Instant) -> bool {
        self.rest_until.is_some_and(|until| now < until)
    }

    /// Whether the resource is resting right now
    pub fn is_resting(&self) -> bool {
        self.is_resting_at(Instant::now())
    }
}
