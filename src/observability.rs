//! Process-wide metrics: admission/rejection and callback delivery
//! counters, read by operational logging.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters/gauges
#[derive(Debug, Default)]
pub struct Metrics {
    tasks_admitted: AtomicU64,
    tasks_rejected: AtomicU64,
    callbacks_delivered: AtomicU64,
    callbacks_undelivered: AtomicU64,
    records_reaped: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_admitted(&self) {
        self.tasks_admitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_admitted", "metric incremented");
    }

    pub fn task_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_rejected", "metric incremented");
    }

    pub fn callback_delivered(&self) {
        self.callbacks_delivered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "callbacks_delivered", "metric incremented");
    }

    pub fn callback_undelivered(&self) {
        self.callbacks_undelivered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "callbacks_undelivered", "metric incremented");
    }

    pub fn records_reaped(&self, count: u64) {
        self.records_reaped.fetch_add(count, Ordering::Relaxed);
        tracing::debug!(counter = "records_reaped", count, "metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_admitted: self.tasks_admitted.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            callbacks_delivered: self.callbacks_delivered.load(Ordering::Relaxed),
            callbacks_undelivered: self.callbacks_undelivered.load(Ordering::Relaxed),
            records_reaped: self.records_reaped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tasks_admitted: u64,
    pub tasks_rejected: u64,
    pub callbacks_delivered: u64,
    pub callbacks_undelivered: u64,
    pub records_reaped: u64,
}
