use std::collections::HashMap;
use std::time::{Duration, Instant};

use multiverse_proto::{ProtocolError, Registration, RegistrationPhase, RegistrationStats};
use multiverse_stat7::{Coordinate, Entity, Stat7Index};

/// Bookkeeping the orchestrator keeps alongside a [`Registration`] that has
/// no place on the wire: when draining started, and at which control-tick.
struct RegistryEntry {
    registration: Registration,
    identity: [u8; 32],
    draining_since: Option<(u64, Instant)>,
}

/// The realm registry: `game_id -> Registration`, plus the STAT7 identity
/// index every registration's coordinate is inserted into. The
/// tick task is the sole owner and mutator.
pub struct Registry {
    games: HashMap<String, RegistryEntry>,
    index: Stat7Index,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            games: HashMap::new(),
            index: Stat7Index::new(),
        }
    }

    /// `proposed -> active`: validates the coordinate, inserts it into the
    /// STAT7 index, and rejects a `game_id` that is still registered (in any
    /// non-retired phase).
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        game_id: String,
        realm_id: String,
        developer: String,
        description: String,
        realm_type: String,
        coordinate: Coordinate,
        local_tick_period_ms: u64,
        now: &str,
    ) -> Result<Registration, ProtocolError> {
        if self.games.contains_key(&game_id) {
            return Err(ProtocolError::duplicate_game_id(&game_id));
        }
        let identity = coordinate.identity()?;
        self.index.insert(Entity {
            id: identity,
            coordinate: coordinate.clone(),
            payload: serde_json::json!({ "game_id": game_id }),
            created_at: now.to_string(),
        })?;

        let registration = Registration {
            game_id: game_id.clone(),
            realm_id,
            developer,
            description,
            realm_type,
            realm_coordinate: coordinate,
            registered_at: now.to_string(),
            local_tick_period_ms,
            last_tick_at: None,
            phase: RegistrationPhase::Active,
            stats: RegistrationStats::default(),
        };
        self.games.insert(
            game_id,
            RegistryEntry {
                registration: registration.clone(),
                identity,
                draining_since: None,
            },
        );
        Ok(registration)
    }

    /// `active -> draining`. Only a currently-active registration may begin
    /// draining; anything else (unknown, already draining) is reported as
    /// `UnknownGameId` to the caller, matching the wire contract that a
    /// draining game is no longer addressable for new work.
    pub fn begin_drain(&mut self, game_id: &str, tick_number: u64) -> Result<(), ProtocolError> {
        let entry = self
            .games
            .get_mut(game_id)
            .filter(|e| e.registration.phase == RegistrationPhase::Active)
            .ok_or_else(|| ProtocolError::unknown_game_id(game_id))?;
        entry.registration.phase = RegistrationPhase::Draining;
        entry.draining_since = Some((tick_number, Instant::now()));
        Ok(())
    }

    /// `draining -> retired`. An entry retires once a full control-tick has
    /// elapsed since it began draining (guaranteeing any events enqueued
    /// against it before `unregister_game` were already routed), or after
    /// `drain_timeout` wall-clock time as a fallback. Retired entries are
    /// removed from the registry; returns the retired `game_id`s.
    pub fn retire_drained(&mut self, tick_number: u64, drain_timeout: Duration) -> Vec<String> {
        let mut retired = Vec::new();
        self.games.retain(|game_id, entry| {
            let Some((since_tick, since_instant)) = entry.draining_since else {
                return true;
            };
            let tick_elapsed = tick_number > since_tick;
            let timed_out = since_instant.elapsed() >= drain_timeout;
            if tick_elapsed || timed_out {
                retired.push(game_id.clone());
                false
            } else {
                true
            }
        });
        retired
    }

    /// True if `game_id` may originate a `publish_event` (must be `Active`).
    pub fn is_active_source(&self, game_id: &str) -> bool {
        self.games
            .get(game_id)
            .map(|e| e.registration.phase == RegistrationPhase::Active)
            .unwrap_or(false)
    }

    /// True if `game_id` may still receive routed events (anything short of
    /// fully retired/removed).
    pub fn is_known_target(&self, game_id: &str) -> bool {
        self.games.contains_key(game_id)
    }

    pub fn get(&self, game_id: &str) -> Option<&Registration> {
        self.games.get(game_id).map(|e| &e.registration)
    }

    pub fn snapshot_list(&self) -> Vec<Registration> {
        let mut list: Vec<Registration> =
            self.games.values().map(|e| e.registration.clone()).collect();
        list.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        list
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Advances every active/draining game's local tick counter and
    /// `last_tick_at` stamp. Draining games still tick so their `stats`
    /// reflect reality while outbound work flushes.
    pub fn advance_local_tick(&mut self, now: &str) {
        for entry in self.games.values_mut() {
            if entry.registration.phase == RegistrationPhase::Retired {
                continue;
            }
            entry.registration.stats.local_ticks += 1;
            entry.registration.last_tick_at = Some(now.to_string());
        }
    }

    pub fn record_published(&mut self, game_id: &str) {
        if let Some(entry) = self.games.get_mut(game_id) {
            entry.registration.stats.events_published += 1;
        }
    }

    pub fn record_received(&mut self, game_id: &str) {
        if let Some(entry) = self.games.get_mut(game_id) {
            entry.registration.stats.events_received += 1;
        }
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiverse_stat7::Horizon;

    fn coord(realm: &str) -> Coordinate {
        Coordinate {
            realm: realm.to_string(),
            lineage: 0,
            adjacency: vec!["hub".to_string()],
            horizon: Horizon::Emergence,
            resonance: 0.5,
            velocity: 0.1,
            density: 0.0,
        }
    }

    #[test]
    fn duplicate_game_id_rejected() {
        let mut registry = Registry::new();
        registry
            .register(
                "tavern".into(),
                "Golden Dragon".into(),
                "devA".into(),
                "bar".into(),
                "social".into(),
                coord("Golden Dragon"),
                100,
                "2024-01-01T00:00:00.000Z",
            )
            .unwrap();
        let err = registry
            .register(
                "tavern".into(),
                "Other".into(),
                "devB".into(),
                "x".into(),
                "social".into(),
                coord("Other"),
                100,
                "2024-01-01T00:00:00.000Z",
            )
            .unwrap_err();
        assert_eq!(err.kind, multiverse_proto::ErrorKind::DuplicateGameId);
    }

    #[test]
    fn drain_then_retire_after_tick_boundary() {
        let mut registry = Registry::new();
        registry
            .register(
                "tavern".into(),
                "Golden Dragon".into(),
                "devA".into(),
                "bar".into(),
                "social".into(),
                coord("Golden Dragon"),
                100,
                "2024-01-01T00:00:00.000Z",
            )
            .unwrap();
        registry.begin_drain("tavern", 5).unwrap();
        assert_eq!(registry.retire_drained(5, Duration::from_secs(1)).len(), 0);
        assert_eq!(registry.retire_drained(6, Duration::from_secs(1)).len(), 1);
        assert!(registry.get("tavern").is_none());
    }
}
