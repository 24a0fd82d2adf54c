use multiverse_stat7::Coordinate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// The five commands a client may send over `/ws`.
///
/// Commands arrive as JSON objects with a discriminating `"action"` field;
/// `try_from_value` is the declarative schema check run once at ingress.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    RegisterGame {
        game_id: String,
        realm_id: String,
        developer_name: String,
        description: String,
        realm_type: String,
        adjacency: Vec<String>,
        resonance: f64,
        velocity: f64,
        density: f64,
        #[serde(default)]
        lineage: Option<u64>,
    },
    UnregisterGame {
        game_id: String,
    },
    PublishEvent {
        source_game_id: String,
        #[serde(default)]
        target_game_id: Option<String>,
        event_type: String,
        data: Value,
    },
    ListGames,
    UniverseState,
}

impl Command {
    /// Parses and validates an inbound frame. Unrecognized `action` values,
    /// missing required fields, and the wrong JSON shape all fail with
    /// `SchemaError` rather than panicking or silently defaulting.
    pub fn try_from_value(value: Value) -> Result<Self, ProtocolError> {
        if !value.is_object() {
            return Err(ProtocolError::schema("command frame must be a JSON object"));
        }
        let command: Command = serde_json::from_value(value)
            .map_err(|e| ProtocolError::schema(format!("malformed command: {e}")))?;
        if let Command::PublishEvent { data, .. } = &command {
            if !data.is_object() {
                return Err(ProtocolError::schema("publish_event data must be a JSON object"));
            }
        }
        Ok(command)
    }

    /// Builds the [`Coordinate`] a `RegisterGame` command describes, with
    /// `horizon` fixed at `Emergence` (every registration begins in the
    /// first lifecycle stage) and `lineage` defaulted to `0` when omitted.
    pub fn realm_coordinate(&self) -> Option<Result<Coordinate, ProtocolError>> {
        match self {
            Command::RegisterGame {
                realm_id,
                adjacency,
                resonance,
                velocity,
                density,
                lineage,
                ..
            } => {
                let coordinate = Coordinate {
                    realm: realm_id.clone(),
                    lineage: lineage.unwrap_or(0),
                    adjacency: adjacency.clone(),
                    horizon: multiverse_stat7::Horizon::Emergence,
                    resonance: *resonance,
                    velocity: *velocity,
                    density: *density,
                };
                Some(coordinate.validate().map(|_| coordinate).map_err(Into::into))
            }
            _ => None,
        }
    }
}
