//! Pipeline counters
//!
//! Counts what flows through ingestion, windowing and reporting, plus
//! per-window processing latency. Shared behind an `Arc` so the binary can
//! export it after the engine stops.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Core metrics for the insight pipeline.
pub struct PipelineMetrics {
    // Windowing
    pub updates_received: AtomicU64,
    pub removals_skipped: AtomicU64,
    pub windows_emitted: AtomicU64,
    pub empty_windows: AtomicU64,
    pub windows_skipped: AtomicU64,
    pub window_processing_ns: Mutex<LatencyTracker>,

    // Reporting
    pub reporter_failures: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            updates_received: AtomicU64::new(0),
            removals_skipped: AtomicU64::new(0),
            windows_emitted: AtomicU64::new(0),
            empty_windows: AtomicU64::new(0),
            windows_skipped: AtomicU64::new(0),
            window_processing_ns: Mutex::new(LatencyTracker::new(1000)),
            reporter_failures: AtomicU64::new(0),
        }
    }

    /// Record a batch handed to the aggregator.
    pub fn record_batch(&self, updates: usize, removals: usize) {
        self.updates_received
            .fetch_add(updates as u64, Ordering::Relaxed);
        self.removals_skipped
            .fetch_add(removals as u64, Ordering::Relaxed);
    }

    /// Record an insight emitted, with its processing time.
    pub fn record_window_emitted(&self, empty: bool, latency_ns: u64) {
        self.windows_emitted.fetch_add(1, Ordering::Relaxed);
        if empty {
            self.empty_windows.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut tracker) = self.window_processing_ns.lock() {
            tracker.record(latency_ns);
        }
    }

    /// Record a window dropped because its arithmetic overflowed.
    pub fn record_window_skipped(&self) {
        self.windows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reporter_failure(&self) {
        self.reporter_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// p99 window processing latency in nanoseconds.
    pub fn processing_p99_ns(&self) -> Option<u64> {
        self.window_processing_ns
            .lock()
            .ok()
            .and_then(|tracker| tracker.percentile(99))
    }

    /// Snapshot of every counter, keyed by name.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("updates_received".to_string(), self.updates_received.load(Ordering::Relaxed));
        m.insert("removals_skipped".to_string(), self.removals_skipped.load(Ordering::Relaxed));
        m.insert("windows_emitted".to_string(), self.windows_emitted.load(Ordering::Relaxed));
        m.insert("empty_windows".to_string(), self.empty_windows.load(Ordering::Relaxed));
        m.insert("windows_skipped".to_string(), self.windows_skipped.load(Ordering::Relaxed));
        m.insert("reporter_failures".to_string(), self.reporter_failures.load(Ordering::Relaxed));
        if let Ok(tracker) = self.window_processing_ns.lock() {
            if let Some(avg) = tracker.average() {
                m.insert("window_processing_avg_ns".to_string(), avg);
            }
        }
        m
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded ring of latency samples for percentile calculation.
pub struct LatencyTracker {
    samples: VecDeque<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Get a percentile value (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (p.min(100) as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn average(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().fold(0u64, |acc, v| acc.saturating_add(*v));
        Some(sum / self.samples.len() as u64)
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}
