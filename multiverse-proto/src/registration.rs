use serde::{Deserialize, Serialize};

use multiverse_stat7::Coordinate;

/// Lifecycle state of a [`Registration`]. A registration's wire
/// snapshot carries this alongside the rest of its fields so `list_games`
/// and `universe_state` responses reflect draining games rather than
/// hiding them until they fully retire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPhase {
    Proposed,
    Active,
    Draining,
    Retired,
}

/// Per-game counters updated on every local and control tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationStats {
    pub local_ticks: u64,
    pub events_published: u64,
    pub events_received: u64,
}

/// The wire/snapshot form of a realm registration. `stats` and
/// `last_tick_at` are mutated only by the orchestrator's tick task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub game_id: String,
    pub realm_id: String,
    pub developer: String,
    pub description: String,
    pub realm_type: String,
    pub realm_coordinate: Coordinate,
    pub registered_at: String,
    pub local_tick_period_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tick_at: Option<String>,
    pub phase: RegistrationPhase,
    pub stats: RegistrationStats,
}

/// Summary of one completed control tick's routing pass, broadcast as a
/// `control_tick_complete` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlTickRecord {
    pub tick_number: u64,
    pub started_at: String,
    pub finished_at: String,
    pub games_synced: u64,
    pub events_routed: u64,
    pub duration_ms: u64,
}

/// Response body for the `universe_state` command and `/api/health`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniverseState {
    pub tick_number: u64,
    pub registered_games: u64,
    pub buffered_events: u64,
    pub uptime_ms: u64,
}
