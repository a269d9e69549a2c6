//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use std::str::FromStr;

/// How the pool picks the next candidate resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectionPolicy {
    /// Advance the cursor by one position on every attempt
    #[default]
    RoundRobin,

    /// Pick a uniformly random position on every attempt
    Random,
}

/// Configuration for resource pool behavior
///
/// Every resource gets its own token bucket refilling at `rate` units per
/// second and holding at most `capacity` units. Each acquisition attempt
/// consumes `batch_size` units from the selected resource.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, SelectionPolicy};
///
/// let config = PoolConfiguration::new()
///     .with_rate(10)
///     .with_capacity(3)
///     .with_batch_size(2)
///     .with_policy(SelectionPolicy::Random);
///
/// assert_eq!(config.rate, 10);
/// assert_eq!(config.capacity, 3);
/// assert_eq!(config.batch_size, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfiguration {
    /// Units added to each resource's bucket per second
    pub rate: u32,

    /// Maximum units a resource's bucket can hold
    pub capacity: u32,

    /// Units consumed by a single acquisition attempt
    pub batch_size: u32,

    /// Candidate selection policy
    pub policy: SelectionPolicy,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            rate: 1,
            capacity: 1,
            batch_size: 1,
            policy: SelectionPolicy::RoundRobin,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a frequency string of the form `rate[,capacity[,batch_size]]`
    ///
    /// Omitted fields default to 1. Fields past the third are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{PoolConfiguration, SelectionPolicy};
    ///
    /// let config = PoolConfiguration::parse("10,3,2", SelectionPolicy::RoundRobin).unwrap();
    /// assert_eq!((config.rate, config.capacity, config.batch_size), (10, 3, 2));
    ///
    /// let config = PoolConfiguration::parse("3", SelectionPolicy::Random).unwrap();
    /// assert_eq!((config.rate, config.capacity, config.batch_size), (3, 1, 1));
    ///
    /// assert!(PoolConfiguration::parse("0.1,10", SelectionPolicy::RoundRobin).is_err());
    /// ```
    pub fn parse(frequency: &str, policy: SelectionPolicy) -> PoolResult<Self> {
        let mut fields = frequency.split(',');
        let mut config = Self::new().with_policy(policy);

        // split always yields at least one field
        config.rate = parse_field(frequency, "rate", fields.next().unwrap_or_default())?;
        if let Some(field) = fields.next() {
            config.capacity = parse_field(frequency, "capacity", field)?;
        }
        if let Some(field) = fields.next() {
            config.batch_size = parse_field(frequency, "batch size", field)?;
        }

        Ok(config)
    }

    /// Check that rate, capacity and batch size are all positive
    ///
    /// A zero batch size would let every acquisition through, and a zero
    /// rate or capacity would leave every resource permanently denied.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// assert!(PoolConfiguration::new().with_rate(5).validate().is_ok());
    /// assert!(PoolConfiguration::new().with_batch_size(0).validate().is_err());
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        let input = format!("{},{},{}", self.rate, self.capacity, self.batch_size);
        for (name, value) in [
            ("rate", self.rate),
            ("capacity", self.capacity),
            ("batch size", self.batch_size),
        ] {
            if value == 0 {
                return Err(invalid(&input, name, format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    /// Set the refill rate in units per second
    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate = rate;
        self
    }

    /// Set the bucket capacity
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the units consumed per acquisition
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the selection policy
    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl FromStr for PoolConfiguration {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, SelectionPolicy::RoundRobin)
    }
}

fn invalid(input: &str, name: &str, reason: String) -> PoolError {
    tracing::warn!(frequency = input, field = name, %reason, "rejecting pool configuration");
    PoolError::InvalidConfiguration {
        input: input.to_string(),
        reason,
    }
}

fn parse_field(input: &str, name: &str, field: &str) -> PoolResult<u32> {
    let field = field.trim();
    let value: u32 = field.parse().map_err(|e| {
        invalid(input, name, format!("{name} {field:?} is not an integer: {e}"))
    })?;
    if value == 0 {
        return Err(invalid(input, name, format!("{name} must be positive")));
    }
    Ok(value)
}
