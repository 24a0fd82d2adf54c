//! Axum WebSocket fan-out server fronting the orchestrator: a single `/ws`
//! endpoint plus `/api/health` and `/api/realms` companions, generalized
//! from `nullspace_simulator`'s `api::{mod, http, ws}` trio.

mod api;
mod config;
mod metrics;

pub use api::{Api, AppState};
pub use config::{ConfigError, ServerConfig};
pub use metrics::{ServerMetrics, ServerMetricsSnapshot};
