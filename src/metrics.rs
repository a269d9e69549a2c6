//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// Acquisition counters cover the whole lifetime of the pool and survive
/// `set_resources` and `reset_all_stats`. Usage totals are summed over the
/// current entries.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
///
/// let pool = ResourcePool::new(vec![1, 2, 3], PoolConfiguration::default()).unwrap();
///
/// let acquired = pool.acquire().unwrap();
/// pool.record_outcome(false, acquired.index);
///
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_acquired, 1);
/// assert_eq!(metrics.total_used, 1);
/// assert_eq!(metrics.total_entries, 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Successful acquisitions
    pub total_acquired: usize,

    /// Acquisitions denied because the pool had no entries
    pub empty_denials: usize,

    /// Acquisitions denied by a resource's token bucket
    pub rate_limited_denials: usize,

    /// Acquisitions denied because the resource was resting
    pub resting_denials: usize,

    /// Number of times the resource list was replaced
    pub reconfigurations: usize,

    /// Current number of entries
    pub total_entries: usize,

    /// Entries currently resting
    pub resting_entries: usize,

    /// Sum of the per-entry usage counters
    pub total_used: u64,

    /// Sum of the per-entry failure counters
    pub total_failed: u64,

    /// Share of acquisition attempts that succeeded (0.0 to 1.0)
    pub success_ratio: f64,
}

impl PoolMetrics {
    /// Total denied acquisitions across all causes
    pub fn total_denied(&self) -> usize {
        self.empty_denials + self.rate_limited_denials + self.resting_denials
    }

    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("empty_denials".to_string(), self.empty_denials.to_string());
        metrics.insert("rate_limited_denials".to_string(), self.rate_limited_denials.to_string());
        metrics.insert("resting_denials".to_string(), self.resting_denials.to_string());
        metrics.insert("reconfigurations".to_string(), self.reconfigurations.to_string());
        metrics.insert("total_entries".to_string(), self.total_entries.to_string());
        metrics.insert("resting_entries".to_string(), self.resting_entries.to_string());
        metrics.insert("total_used".to_string(), self.total_used.to_string());
        metrics.insert("total_failed".to_string(), self.total_failed.to_string());
        metrics.insert("success_ratio".to_string(), format!("{:.2}", self.success_ratio));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{MetricsExporter, PoolConfiguration, ResourcePool};
    /// use std::collections::HashMap;
    ///
    /// let pool = ResourcePool::new(vec!["ip-1", "ip-2"], PoolConfiguration::default()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "crawler".to_string());
    ///
    /// let metrics = pool.get_metrics();
    /// let output = MetricsExporter::export_prometheus(&metrics, "egress", Some(&tags));
    /// assert!(output.contains("resourcepool_entries{pool=\"egress\",service=\"crawler\"} 2"));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        let series = [
            ("resourcepool_entries", "gauge", "Configured resources", metrics.total_entries),
            (
                "resourcepool_entries_resting",
                "gauge",
                "Resources currently resting",
                metrics.resting_entries,
            ),
            (
                "resourcepool_acquired_total",
                "counter",
                "Successful acquisitions",
                metrics.total_acquired,
            ),
            (
                "resourcepool_reconfigurations_total",
                "counter",
                "Resource list replacements",
                metrics.reconfigurations,
            ),
        ];
        for (name, kind, help, value) in series {
            Self::write_series(&mut output, name, kind, help, &labels, value);
        }

        Self::write_series(
            &mut output,
            "resourcepool_used_total",
            "counter",
            "Recorded outcomes",
            &labels,
            metrics.total_used,
        );
        Self::write_series(
            &mut output,
            "resourcepool_failed_total",
            "counter",
            "Recorded failures",
            &labels,
            metrics.total_failed,
        );
        Self::write_series(
            &mut output,
            "resourcepool_success_ratio",
            "gauge",
            "Share of acquisition attempts that succeeded",
            &labels,
            format!("{:.2}", metrics.success_ratio),
        );

        output.push_str("# HELP resourcepool_denied_total Denied acquisitions by reason\n");
        output.push_str("# TYPE resourcepool_denied_total counter\n");
        for (reason, value) in [
            ("empty", metrics.empty_denials),
            ("rate_limited", metrics.rate_limited_denials),
            ("resting", metrics.resting_denials),
        ] {
            output.push_str(&format!(
                "resourcepool_denied_total{{{},reason=\"{}\"}} {}\n",
                labels, reason, value
            ));
        }

        output
    }

    fn write_series(
        output: &mut String,
        name: &str,
        kind: &str,
        help: &str,
        labels: &str,
        value: impl std::fmt::Display,
    ) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} {}\n", name, kind));
        output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut tags: Vec<_> = tags.iter().collect();
            tags.sort();
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub total_acquired: AtomicUsize,
    pub empty_denials: AtomicUsize,
    pub rate_limited_denials: AtomicUsize,
    pub resting_denials: AtomicUsize,
    pub reconfigurations: AtomicUsize,
}

/// Live gauges read from the entries under the pool lock
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct EntryTotals {
    pub entries: usize,
    pub resting: usize,
    pub used: u64,
    pub failed: u64,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_metrics(&self, totals: EntryTotals) -> PoolMetrics {
        let acquired = self.total_acquired.load(Ordering::Relaxed);
        let empty = self.empty_denials.load(Ordering::Relaxed);
        let rate_limited = self.rate_limited_denials.load(Ordering::Relaxed);
        let resting = self.resting_denials.load(Ordering::Relaxed);

        let attempts = acquired + empty + rate_limited + resting;
        let success_ratio = if attempts > 0 {
            acquired as f64 / attempts as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_acquired: acquired,
            empty_denials: empty,
            rate_limited_denials: rate_limited,
            resting_denials: resting,
            reconfigurations: self.reconfigurations.load(Ordering::Relaxed),
            total_entries: totals.entries,
            resting_entries: totals.resting,
            total_used: totals.used,
            total_failed: totals.failed,
            success_ratio,
        }
    }
}
