use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The recognized `event_type` values. Clients publish
/// application-defined subtypes through `CrossGameEvent`, carried in
/// `data.event_type_detail`; the other variants are server-originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    GameRegistered,
    GameUnregistered,
    CrossGameEvent,
    ControlTickComplete,
    UniverseState,
    GameList,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::GameRegistered => "game_registered",
            EventKind::GameUnregistered => "game_unregistered",
            EventKind::CrossGameEvent => "cross_game_event",
            EventKind::ControlTickComplete => "control_tick_complete",
            EventKind::UniverseState => "universe_state",
            EventKind::GameList => "game_list",
            EventKind::Error => "error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A server-stamped, schema-validated envelope in the append-only log.
/// `seq` and `ts` are assigned by the log at append time; any
/// client-supplied `seq`/`ts` on the way in is discarded, never honored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub seq: u64,
    pub event_type: EventKind,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_game_id: Option<String>,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// An envelope awaiting `seq`/`ts` assignment by the log.
pub struct UnstampedEnvelope {
    pub event_type: EventKind,
    pub source_game_id: Option<String>,
    pub target_game_id: Option<String>,
    pub data: Value,
    pub metadata: Option<Value>,
}

impl UnstampedEnvelope {
    pub fn new(event_type: EventKind, data: Value) -> Self {
        Self {
            event_type,
            source_game_id: None,
            target_game_id: None,
            data,
            metadata: None,
        }
    }

    pub fn with_source(mut self, source_game_id: impl Into<String>) -> Self {
        self.source_game_id = Some(source_game_id.into());
        self
    }

    pub fn with_target(mut self, target_game_id: Option<String>) -> Self {
        self.target_game_id = target_game_id;
        self
    }
}
