use std::collections::BTreeMap;
use std::str::FromStr;

use multiverse_canon::{fingerprint, format_float, CanonicalValue};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::{Horizon, Stat7Error};

/// The full seven-dimensional coordinate. `realm`, `lineage`, and
/// `adjacency` are immutable once an entity is created; `horizon`,
/// `resonance`, `velocity`, and `density` are dynamic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub realm: String,
    pub lineage: u64,
    pub adjacency: Vec<String>,
    pub horizon: Horizon,
    pub resonance: f64,
    pub velocity: f64,
    pub density: f64,
}

impl Coordinate {
    /// Validates the invariants from the data model: adjacency has no
    /// duplicates, and the three dynamic reals lie in `[0, 1]` and are
    /// finite.
    pub fn validate(&self) -> Result<(), Stat7Error> {
        if self.realm.is_empty() {
            return Err(Stat7Error::InvalidCoordinate("realm must not be empty".into()));
        }
        let mut seen = std::collections::HashSet::with_capacity(self.adjacency.len());
        for token in &self.adjacency {
            if !seen.insert(token) {
                return Err(Stat7Error::InvalidCoordinate(format!(
                    "duplicate adjacency token: {token}"
                )));
            }
        }
        for (name, value) in [
            ("resonance", self.resonance),
            ("velocity", self.velocity),
            ("density", self.density),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Stat7Error::InvalidCoordinate(format!(
                    "{name} must be a finite value in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// The immutable identity subset: `{realm, lineage, adjacency}`.
    fn identity_value(&self) -> CanonicalValue {
        let mut fields = BTreeMap::new();
        fields.insert("realm".to_string(), CanonicalValue::Str(self.realm.clone()));
        fields.insert(
            "lineage".to_string(),
            CanonicalValue::Int(self.lineage as i64),
        );
        fields.insert(
            "adjacency".to_string(),
            CanonicalValue::Array(
                self.adjacency
                    .iter()
                    .cloned()
                    .map(CanonicalValue::Str)
                    .collect(),
            ),
        );
        CanonicalValue::Object(fields)
    }

    /// SHA-256 fingerprint of the canonicalized identity subset. Two
    /// coordinates with identical `{realm, lineage, adjacency}` always
    /// yield identical identity addresses.
    pub fn identity(&self) -> Result<[u8; 32], Stat7Error> {
        fingerprint(&self.identity_value()).map_err(|e| Stat7Error::InvalidCoordinate(e.to_string()))
    }

    /// An identity subset that drops one of the three immutable dimensions,
    /// used only by the dimension-necessity property test (§8 item 4) to
    /// show the collision rate rises when a dimension is omitted.
    #[doc(hidden)]
    pub fn identity_without(&self, drop: IdentityDimension) -> Result<[u8; 32], Stat7Error> {
        let mut fields = BTreeMap::new();
        if drop != IdentityDimension::Realm {
            fields.insert("realm".to_string(), CanonicalValue::Str(self.realm.clone()));
        }
        if drop != IdentityDimension::Lineage {
            fields.insert(
                "lineage".to_string(),
                CanonicalValue::Int(self.lineage as i64),
            );
        }
        if drop != IdentityDimension::Adjacency {
            fields.insert(
                "adjacency".to_string(),
                CanonicalValue::Array(
                    self.adjacency
                        .iter()
                        .cloned()
                        .map(CanonicalValue::Str)
                        .collect(),
                ),
            );
        }
        fingerprint(&CanonicalValue::Object(fields))
            .map_err(|e| Stat7Error::InvalidCoordinate(e.to_string()))
    }

    /// Grammar encoding:
    /// `stat7://<realm>:<lineage>/<adj1>,...,<adjN>/<horizon>?resonance=<r>&velocity=<v>&density=<d>`
    pub fn address(&self) -> Result<String, Stat7Error> {
        self.validate()?;
        let realm_enc = utf8_percent_encode(&self.realm, NON_ALPHANUMERIC).to_string();
        let adj_enc = self
            .adjacency
            .iter()
            .map(|token| utf8_percent_encode(token, NON_ALPHANUMERIC).to_string())
            .collect::<Vec<_>>()
            .join(",");
        let r = format_float(self.resonance).map_err(|e| Stat7Error::InvalidCoordinate(e.to_string()))?;
        let v = format_float(self.velocity).map_err(|e| Stat7Error::InvalidCoordinate(e.to_string()))?;
        let d = format_float(self.density).map_err(|e| Stat7Error::InvalidCoordinate(e.to_string()))?;
        Ok(format!(
            "stat7://{realm_enc}:{lineage}/{adj_enc}/{horizon}?resonance={r}&velocity={v}&density={d}",
            lineage = self.lineage,
            horizon = self.horizon,
        ))
    }

    /// Inverse of [`Coordinate::address`]. Encoder and decoder are exact
    /// inverses on the value set defined by the data model.
    pub fn decode(address: &str) -> Result<Self, Stat7Error> {
        let rest = address.strip_prefix("stat7://").ok_or_else(|| {
            Stat7Error::InvalidCoordinate("address missing stat7:// scheme".into())
        })?;
        let (path, query) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };

        let mut segments = path.splitn(3, '/');
        let realm_lineage = segments
            .next()
            .ok_or_else(|| Stat7Error::InvalidCoordinate("missing realm:lineage segment".into()))?;
        let adj_csv = segments.next().unwrap_or("");
        let horizon_str = segments
            .next()
            .ok_or_else(|| Stat7Error::InvalidCoordinate("missing horizon segment".into()))?;

        let (realm_enc, lineage_str) = realm_lineage.rsplit_once(':').ok_or_else(|| {
            Stat7Error::InvalidCoordinate("missing ':' between realm and lineage".into())
        })?;
        let realm = percent_decode_str(realm_enc)
            .decode_utf8()
            .map_err(|e| Stat7Error::InvalidCoordinate(e.to_string()))?
            .into_owned();
        let lineage: u64 = lineage_str
            .parse()
            .map_err(|_| Stat7Error::InvalidCoordinate(format!("bad lineage: {lineage_str}")))?;

        let adjacency = if adj_csv.is_empty() {
            Vec::new()
        } else {
            adj_csv
                .split(',')
                .map(|tok| {
                    percent_decode_str(tok)
                        .decode_utf8()
                        .map(|cow| cow.into_owned())
                        .map_err(|e| Stat7Error::InvalidCoordinate(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let horizon = Horizon::from_str(horizon_str)?;

        let mut resonance = None;
        let mut velocity = None;
        let mut density = None;
        if let Some(query) = query {
            for pair in query.split('&') {
                if pair.is_empty() {
                    continue;
                }
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    Stat7Error::InvalidCoordinate(format!("malformed query field: {pair}"))
                })?;
                let parsed: f64 = value
                    .parse()
                    .map_err(|_| Stat7Error::InvalidCoordinate(format!("bad float: {value}")))?;
                match key {
                    "resonance" => resonance = Some(parsed),
                    "velocity" => velocity = Some(parsed),
                    "density" => density = Some(parsed),
                    other => {
                        return Err(Stat7Error::InvalidCoordinate(format!(
                            "unknown query field: {other}"
                        )))
                    }
                }
            }
        }

        let coordinate = Coordinate {
            realm,
            lineage,
            adjacency,
            horizon,
            resonance: resonance
                .ok_or_else(|| Stat7Error::InvalidCoordinate("missing resonance".into()))?,
            velocity: velocity
                .ok_or_else(|| Stat7Error::InvalidCoordinate("missing velocity".into()))?,
            density: density
                .ok_or_else(|| Stat7Error::InvalidCoordinate("missing density".into()))?,
        };
        coordinate.validate()?;
        Ok(coordinate)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[doc(hidden)]
pub enum IdentityDimension {
    Realm,
    Lineage,
    Adjacency,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Coordinate {
        Coordinate {
            realm: "alpha".to_string(),
            lineage: 3,
            adjacency: vec!["x".to_string(), "y".to_string()],
            horizon: Horizon::Active,
            resonance: 0.333_333_33,
            velocity: 0.125,
            density: 0.0,
        }
    }

    #[test]
    fn address_round_trips() {
        let c = sample();
        let addr = c.address().unwrap();
        let decoded = Coordinate::decode(&addr).unwrap();
        assert_eq!(c, decoded);
    }

    #[test]
    fn empty_adjacency_yields_empty_segment() {
        let mut c = sample();
        c.adjacency = vec![];
        let addr = c.address().unwrap();
        assert!(addr.contains("//active") || addr.contains("//"));
        let decoded = Coordinate::decode(&addr).unwrap();
        assert_eq!(decoded.adjacency, Vec::<String>::new());
    }

    #[test]
    fn identity_ignores_dynamic_fields() {
        let mut c1 = sample();
        let mut c2 = sample();
        c1.resonance = 0.9;
        c2.resonance = 0.1;
        c1.horizon = Horizon::Emergence;
        c2.horizon = Horizon::Archived;
        assert_eq!(c1.identity().unwrap(), c2.identity().unwrap());
    }

    #[test]
    fn identity_changes_when_realm_changes() {
        let c1 = sample();
        let mut c2 = sample();
        c2.realm = "beta".to_string();
        assert_ne!(c1.identity().unwrap(), c2.identity().unwrap());
    }

    #[test]
    fn rejects_duplicate_adjacency() {
        let mut c = sample();
        c.adjacency = vec!["x".to_string(), "x".to_string()];
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_dynamic_fields() {
        let mut c = sample();
        c.resonance = 1.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn matches_literal_s6_fingerprint_shape() {
        let c = Coordinate {
            realm: "alpha".to_string(),
            lineage: 3,
            adjacency: vec!["x".to_string(), "y".to_string()],
            horizon: Horizon::Active,
            resonance: 0.333_333_33,
            velocity: 0.125,
            density: 0.0,
        };
        let addr = c.address().unwrap();
        let decoded = Coordinate::decode(&addr).unwrap();
        assert_eq!(decoded.identity().unwrap(), c.identity().unwrap());
    }
}
