use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-connection and admission-control counters surfaced via
/// `/api/health`.
#[derive(Default)]
pub struct ServerMetrics {
    connections_accepted: AtomicU64,
    connections_rejected_overloaded: AtomicU64,
    connections_rejected_origin: AtomicU64,
    send_errors: AtomicU64,
    overruns: AtomicU64,
    schema_errors: AtomicU64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ServerMetricsSnapshot {
    pub connections_accepted: u64,
    pub connections_rejected_overloaded: u64,
    pub connections_rejected_origin: u64,
    pub send_errors: u64,
    pub overruns: u64,
    pub schema_errors: u64,
}

impl ServerMetrics {
    pub fn record_connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_rejected_overloaded(&self) {
        self.connections_rejected_overloaded
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_rejected_origin(&self) {
        self.connections_rejected_origin
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_schema_error(&self) {
        self.schema_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerMetricsSnapshot {
        ServerMetricsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_rejected_overloaded: self
                .connections_rejected_overloaded
                .load(Ordering::Relaxed),
            connections_rejected_origin: self.connections_rejected_origin.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            schema_errors: self.schema_errors.load(Ordering::Relaxed),
        }
    }
}
