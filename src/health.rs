//! Health monitoring for resource pools

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
///
/// let pool = ResourcePool::new(vec![1, 2, 3], PoolConfiguration::default()).unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.available_entries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool can currently hand out resources
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Share of entries resting (0.0 to 1.0)
    pub resting_ratio: f64,

    /// Entries not resting
    pub available_entries: usize,

    /// Entries resting
    pub resting_entries: usize,

    /// Total entries
    pub total_entries: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(total: usize, resting: usize) -> Self {
        let resting_ratio = if total > 0 {
            resting as f64 / total as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if total == 0 {
            warnings.push("Pool is empty".to_string());
            is_healthy = false;
        } else if resting == total {
            warnings.push("All resources are resting".to_string());
            is_healthy = false;
        } else if resting_ratio > 0.5 {
            warnings.push(format!("High resting ratio: {:.1}%", resting_ratio * 100.0));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            resting_ratio,
            available_entries: total - resting,
            resting_entries: resting,
            total_entries: total,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
