//! STAT7 seven-dimensional coordinate, address grammar, and identity index.
//!
//! A STAT7 coordinate addresses an entity across realms along seven axes:
//! three immutable (`realm`, `lineage`, `adjacency`) that fix identity, and
//! four dynamic (`horizon`, `resonance`, `velocity`, `density`) that drift
//! over the entity's lifetime without changing what it *is*.

mod coordinate;
mod horizon;
mod index;

pub use coordinate::{Coordinate, IdentityDimension};
pub use horizon::Horizon;
pub use index::{Entity, Stat7Index};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Stat7Error {
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
    #[error("duplicate identity: an entity with this identity already exists with a different identity set")]
    DuplicateIdentity,
}
