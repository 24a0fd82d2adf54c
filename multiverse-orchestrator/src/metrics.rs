use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters surfaced via `/api/health`. Fatal internal errors
/// increment a failure counter rather than aborting the tick task.
#[derive(Default)]
pub struct OrchestratorMetrics {
    tick_failures: AtomicU64,
    ticks_completed: AtomicU64,
    events_routed_total: AtomicU64,
    subscriber_overruns: AtomicU64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct OrchestratorMetricsSnapshot {
    pub tick_failures: u64,
    pub ticks_completed: u64,
    pub events_routed_total: u64,
    pub subscriber_overruns: u64,
}

impl OrchestratorMetrics {
    pub fn record_tick_failure(&self) {
        self.tick_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_completed(&self) {
        self.ticks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events_routed(&self, count: u64) {
        self.events_routed_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_overrun(&self) {
        self.subscriber_overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OrchestratorMetricsSnapshot {
        OrchestratorMetricsSnapshot {
            tick_failures: self.tick_failures.load(Ordering::Relaxed),
            ticks_completed: self.ticks_completed.load(Ordering::Relaxed),
            events_routed_total: self.events_routed_total.load(Ordering::Relaxed),
            subscriber_overruns: self.subscriber_overruns.load(Ordering::Relaxed),
        }
    }
}
