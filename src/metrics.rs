use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-pipeline metrics collector
///
/// Clones share the same counters, so a handle kept by the caller keeps
/// observing a pipeline that was moved into a driver.
#[derive(Debug, Clone)]
pub struct DriveMetrics {
    /// Number of items pulled from the source
    items_pulled: Arc<AtomicU64>,
    /// Number of items the root node accepted
    items_accepted: Arc<AtomicU64>,
    /// Number of times the root node asked for no more input
    terminations: Arc<AtomicU64>,
    /// Number of pipelines finished
    runs: Arc<AtomicU64>,
    /// Creation time for throughput calculation
    start_time: Instant,
}

impl DriveMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            items_pulled: Arc::new(AtomicU64::new(0)),
            items_accepted: Arc::new(AtomicU64::new(0)),
            terminations: Arc::new(AtomicU64::new(0)),
            runs: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn record_pulled(&self) {
        self.items_pulled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.items_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_termination(&self) {
        self.terminations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_pulled(&self) -> u64 {
        self.items_pulled.load(Ordering::Relaxed)
    }

    pub fn total_accepted(&self) -> u64 {
        self.items_accepted.load(Ordering::Relaxed)
    }

    pub fn total_terminations(&self) -> u64 {
        self.terminations.load(Ordering::Relaxed)
    }

    pub fn total_runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Calculate accepted items per second since creation
    pub fn throughput_ips(&self) -> f64 {
        let elapsed = self.start_time.elapsed();
        let total = self.total_accepted();
        if elapsed.as_secs_f64() == 0.0 {
            0.0
        } else {
            total as f64 / elapsed.as_secs_f64()
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_pulled: self.total_pulled(),
            items_accepted: self.total_accepted(),
            terminations: self.total_terminations(),
            runs: self.total_runs(),
            throughput_ips: self.throughput_ips(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for DriveMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub items_pulled: u64,
    pub items_accepted: u64,
    pub terminations: u64,
    pub runs: u64,
    pub throughput_ips: f64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Pulled: {}, Accepted: {}, Terminations: {}, Runs: {}, \
             Throughput: {:.2} items/s, Elapsed: {:.2}s",
            self.items_pulled,
            self.items_accepted,
            self.terminations,
            self.runs,
            self.throughput_ips,
            self.elapsed.as_secs_f64()
        )
    }
}
