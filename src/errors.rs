//! Error types for the resource pool

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Invalid frequency configuration {input:?}: {reason}")]
    InvalidConfiguration { input: String, reason: String },

    #[error("Pool is empty - no resources configured")]
    PoolEmpty,

    #[error("Resource {index} is rate limited")]
    RateLimited { index: usize },

    #[error("Resource {index} is resting for another {remaining:?}")]
    Resting { index: usize, remaining: Duration },
}

impl PoolError {
    /// Whether this error is an ordinary throttling denial the caller may retry later
    pub fn is_denial(&self) -> bool {
        !matches!(self, PoolError::InvalidConfiguration { .. })
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
