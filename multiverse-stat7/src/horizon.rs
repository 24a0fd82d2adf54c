use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Stat7Error;

/// Lifecycle stage of a coordinate. Ordinal position is the monotone-forward
/// ordering: a coordinate may only move to an equal-or-later stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Emergence,
    Active,
    Crystallization,
    Archived,
}

impl Horizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Horizon::Emergence => "emergence",
            Horizon::Active => "active",
            Horizon::Crystallization => "crystallization",
            Horizon::Archived => "archived",
        }
    }

    /// A horizon may advance to itself or to any later stage; never backward.
    pub fn can_advance_to(&self, next: Horizon) -> bool {
        next >= *self
    }
}

impl FromStr for Horizon {
    type Err = Stat7Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emergence" => Ok(Horizon::Emergence),
            "active" => Ok(Horizon::Active),
            "crystallization" => Ok(Horizon::Crystallization),
            "archived" => Ok(Horizon::Archived),
            other => Err(Stat7Error::InvalidCoordinate(format!(
                "unknown horizon: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
