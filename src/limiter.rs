//! Admission control for individual resources

use std::time::Instant;

/// Non-blocking admission primitive owned by each pool entry
///
/// Implementations answer whether `units` may be consumed at `now` and
/// consume them when they may. They never wait for capacity.
pub trait Admission: Clone + Send {
    /// Build a limiter refilling `rate` units per second up to `capacity`
    fn with_limits(rate: u32, capacity: u32) -> Self;

    /// Try to consume `units` at `now`, returning whether they were consumed
    fn try_consume_at(&mut self, units: u32, now: Instant) -> bool;

    /// Units that would be held at `now`, without consuming or updating state
    fn available_at(&self, now: Instant) -> f64;
}

/// Token bucket that starts full and refills continuously
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Admission, TokenBucket};
/// use std::time::{Duration, Instant};
///
/// let mut bucket = TokenBucket::with_limits(100, 2);
/// let now = Instant::now();
///
/// assert!(bucket.try_consume_at(2, now));
/// assert!(!bucket.try_consume_at(1, now));
///
/// // 100 units per second: one unit every 10ms
/// assert!(bucket.try_consume_at(1, now + Duration::from_millis(10)));
/// ```
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    last_refill: Option<Instant>,
}

impl TokenBucket {
    fn refilled_at(&self, now: Instant) -> f64 {
        match self.last_refill {
            Some(last) if now > last => {
                let elapsed = now.duration_since(last).as_secs_f64();
                (self.tokens + elapsed * self.rate).min(self.capacity)
            }
            _ => self.tokens,
        }
    }

    fn refill(&mut self, now: Instant) {
        self.tokens = self.refilled_at(now);
        if self.last_refill.is_none_or(|last| now > last) {
            self.last_refill = Some(now);
        }
    }

    /// Refill rate in units per second
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum units the bucket holds
    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

impl Admission for TokenBucket {
    fn with_limits(rate: u32, capacity: u32) -> Self {
        Self {
            rate: f64::from(rate),
            capacity: f64::from(capacity),
            tokens: f64::from(capacity),
            last_refill: None,
        }
    }

    fn try_consume_at(&mut self, units: u32, now: Instant) -> bool {
        self.refill(now);

        let units = f64::from(units);
        if units > self.capacity || self.tokens < units {
            return false;
        }
        self.tokens -= units;
        true
    }

    fn available_at(&self, now: Instant) -> f64 {
        self.refilled_at(now)
    }
}
