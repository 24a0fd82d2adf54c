use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Coordinate, Stat7Error};

/// An addressable datum whose identity is the fingerprint of its immutable
/// STAT7 subset. `payload` is any canonical mapping and is not part of the
/// identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub id: [u8; 32],
    pub coordinate: Coordinate,
    pub payload: serde_json::Value,
    pub created_at: String,
}

/// Address-keyed identity index. Owned exclusively by the orchestrator's
/// tick task; not a freestanding shared service.
#[derive(Default)]
pub struct Stat7Index {
    entities: HashMap<[u8; 32], Entity>,
}

impl Stat7Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, identity: &[u8; 32]) -> Option<&Entity> {
        self.entities.get(identity)
    }

    /// Fails with `DuplicateIdentity` if an entity with the same identity
    /// already exists and has a differing identity set (a hash collision).
    /// If the existing entity has the same identity set, the insert is
    /// idempotent: the call succeeds and leaves the index unchanged.
    pub fn insert(&mut self, entity: Entity) -> Result<(), Stat7Error> {
        match self.entities.get(&entity.id) {
            None => {
                self.entities.insert(entity.id, entity);
                Ok(())
            }
            Some(existing) => {
                if identity_sets_match(&existing.coordinate, &entity.coordinate) {
                    Ok(())
                } else {
                    Err(Stat7Error::DuplicateIdentity)
                }
            }
        }
    }

    pub fn remove(&mut self, identity: &[u8; 32]) -> Option<Entity> {
        self.entities.remove(identity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn identity_sets_match(a: &Coordinate, b: &Coordinate) -> bool {
    a.realm == b.realm && a.lineage == b.lineage && a.adjacency == b.adjacency
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Horizon;

    fn entity(realm: &str, lineage: u64) -> Entity {
        let coordinate = Coordinate {
            realm: realm.to_string(),
            lineage,
            adjacency: vec![],
            horizon: Horizon::Emergence,
            resonance: 0.0,
            velocity: 0.0,
            density: 0.0,
        };
        Entity {
            id: coordinate.identity().unwrap(),
            coordinate,
            payload: serde_json::json!({}),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn insert_then_lookup_round_trips() {
        let mut index = Stat7Index::new();
        let e = entity("alpha", 0);
        let id = e.id;
        index.insert(e).unwrap();
        assert!(index.lookup(&id).is_some());
    }

    #[test]
    fn repeated_identical_insert_is_idempotent() {
        let mut index = Stat7Index::new();
        index.insert(entity("alpha", 0)).unwrap();
        index.insert(entity("alpha", 0)).unwrap();
        assert_eq!(index.len(), 1);
    }
}
