use multiverse_orchestrator::OrchestratorConfig;
use multiverse_proto::Command;

/// A short tick period with every local tick also a control tick, so
/// integration tests don't need to wait out the default 100ms/10-tick
/// cadence.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        tick_period_ms: 10,
        control_tick_divisor: 1,
        buffer_max: 200,
        queue_max: 100,
        shutdown_grace_ms: 200,
        drain_timeout_ms: 200,
    }
}

pub fn register_game(game_id: &str, adjacency: Vec<&str>) -> Command {
    Command::RegisterGame {
        game_id: game_id.to_string(),
        realm_id: format!("realm-{game_id}"),
        developer_name: "dev".to_string(),
        description: "test realm".to_string(),
        realm_type: "social".to_string(),
        adjacency: adjacency.into_iter().map(|s| s.to_string()).collect(),
        resonance: 0.5,
        velocity: 0.1,
        density: 0.0,
        lineage: None,
    }
}
