use std::collections::BTreeMap;

use crate::CanonError;

/// A value that can be canonically serialized: the closed set described by
/// the data model (null, bool, integer, finite float, string, ordered
/// array, or string-keyed object). Object keys are held in a `BTreeMap` so
/// ASCII-lexicographic ordering falls out of the container rather than
/// needing a sort pass at encode time.
#[derive(Clone, Debug, PartialEq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<CanonicalValue>),
    Object(BTreeMap<String, CanonicalValue>),
}

impl CanonicalValue {
    pub fn object<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, CanonicalValue)>,
    {
        CanonicalValue::Object(entries.into_iter().collect())
    }

    /// Recursion depth is the practical stand-in for cycle detection: a
    /// `CanonicalValue` built from `serde_json::Value` is always a tree, so
    /// cycles cannot arise structurally, but runaway depth still indicates
    /// a malformed caller-constructed value.
    pub(crate) fn check_well_formed(&self, depth: usize) -> Result<(), CanonError> {
        const MAX_DEPTH: usize = 256;
        if depth > MAX_DEPTH {
            return Err(CanonError::Cycle);
        }
        match self {
            CanonicalValue::Null | CanonicalValue::Bool(_) | CanonicalValue::Int(_) => Ok(()),
            CanonicalValue::Float(f) => {
                if f.is_finite() {
                    Ok(())
                } else {
                    Err(CanonError::NonFinite)
                }
            }
            CanonicalValue::Str(_) => Ok(()),
            CanonicalValue::Array(items) => {
                for item in items {
                    item.check_well_formed(depth + 1)?;
                }
                Ok(())
            }
            CanonicalValue::Object(fields) => {
                for value in fields.values() {
                    value.check_well_formed(depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<&serde_json::Value> for CanonicalValue {
    type Error = CanonError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Ok(CanonicalValue::Null),
            serde_json::Value::Bool(b) => Ok(CanonicalValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(CanonicalValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    if f.is_finite() {
                        Ok(CanonicalValue::Float(f))
                    } else {
                        Err(CanonError::NonFinite)
                    }
                } else {
                    Err(CanonError::NonFinite)
                }
            }
            serde_json::Value::String(s) => Ok(CanonicalValue::Str(s.clone())),
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(CanonicalValue::try_from(item)?);
                }
                Ok(CanonicalValue::Array(out))
            }
            serde_json::Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    out.insert(k.clone(), CanonicalValue::try_from(v)?);
                }
                Ok(CanonicalValue::Object(out))
            }
        }
    }
}

impl TryFrom<serde_json::Value> for CanonicalValue {
    type Error = CanonError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        CanonicalValue::try_from(&value)
    }
}

impl From<&CanonicalValue> for serde_json::Value {
    fn from(value: &CanonicalValue) -> Self {
        match value {
            CanonicalValue::Null => serde_json::Value::Null,
            CanonicalValue::Bool(b) => serde_json::Value::Bool(*b),
            CanonicalValue::Int(i) => serde_json::Value::from(*i),
            CanonicalValue::Float(f) => serde_json::json!(f),
            CanonicalValue::Str(s) => serde_json::Value::String(s.clone()),
            CanonicalValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            CanonicalValue::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}
