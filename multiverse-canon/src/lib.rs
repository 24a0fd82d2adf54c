//! Deterministic canonical JSON encoding and SHA-256 fingerprinting.
//!
//! `canonicalize` and `fingerprint` are the only two operations this crate
//! exposes; everything else is in service of making them pure and
//! reproducible across processes and platforms.

mod value;

pub use value::CanonicalValue;

use sha2::{Digest, Sha256};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonError {
    #[error("non-finite float cannot be canonicalized")]
    NonFinite,
    #[error("cyclic or excessively deep value")]
    Cycle,
    #[error("object key is not a string")]
    NonStringKey,
    #[error("value is not a valid ISO-8601 UTC-milliseconds timestamp: {0}")]
    BadTimestamp(String),
}

/// Encode `value` as canonical JSON bytes.
///
/// Objects are emitted with ASCII-lexicographic key order, arrays preserve
/// insertion order, integers have no decimal point, and floats are
/// formatted with a fixed 8 fractional digits. There is no whitespace
/// between tokens and no trailing newline.
pub fn canonicalize(value: &CanonicalValue) -> Result<Vec<u8>, CanonError> {
    value.check_well_formed(0)?;
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out.into_bytes())
}

/// SHA-256 over `canonicalize(value)`.
pub fn fingerprint(value: &CanonicalValue) -> Result<[u8; 32], CanonError> {
    let bytes = canonicalize(value)?;
    let digest = Sha256::digest(&bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(out)
}

fn write_value(value: &CanonicalValue, out: &mut String) -> Result<(), CanonError> {
    match value {
        CanonicalValue::Null => out.push_str("null"),
        CanonicalValue::Bool(true) => out.push_str("true"),
        CanonicalValue::Bool(false) => out.push_str("false"),
        CanonicalValue::Int(i) => out.push_str(&i.to_string()),
        CanonicalValue::Float(f) => out.push_str(&format_float(*f)?),
        CanonicalValue::Str(s) => write_string(s, out),
        CanonicalValue::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        CanonicalValue::Object(fields) => {
            out.push('{');
            for (idx, (key, val)) in fields.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(val, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// Fixed 8-decimal banker's-rounded representation, e.g. `1.0` -> `1.00000000`.
///
/// Rust's float-to-decimal formatter rounds ties to even at the requested
/// precision, which is exactly the banker's-rounding rule the wire grammar
/// requires, so a plain `{:.8}` format does the work.
pub fn format_float(f: f64) -> Result<String, CanonError> {
    if !f.is_finite() {
        return Err(CanonError::NonFinite);
    }
    let normalized = if f == 0.0 { 0.0 } else { f };
    Ok(format!("{:.8}", normalized))
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Validates that `s` is an ISO-8601 UTC-milliseconds timestamp of the form
/// `YYYY-MM-DDTHH:MM:SS.sssZ`. Called explicitly by producers that stamp a
/// value as a timestamp (the canonicalizer itself does not parse semantics
/// for arbitrary strings, per the format-only validation rule).
pub fn validate_timestamp_ms(s: &str) -> Result<(), CanonError> {
    let bytes = s.as_bytes();
    let valid = bytes.len() == 24
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[10] == b'T'
        && bytes[13] == b':'
        && bytes[16] == b':'
        && bytes[19] == b'.'
        && bytes[23] == b'Z'
        && bytes[0..4].iter().all(u8::is_ascii_digit)
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[8..10].iter().all(u8::is_ascii_digit)
        && bytes[11..13].iter().all(u8::is_ascii_digit)
        && bytes[14..16].iter().all(u8::is_ascii_digit)
        && bytes[17..19].iter().all(u8::is_ascii_digit)
        && bytes[20..23].iter().all(u8::is_ascii_digit);
    if valid {
        Ok(())
    } else {
        Err(CanonError::BadTimestamp(s.to_string()))
    }
}

/// Parses canonical JSON bytes back into a `CanonicalValue`, for the
/// round-trip property (`parse(canonicalize(x)) == x`).
pub fn parse(bytes: &[u8]) -> Result<CanonicalValue, CanonError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|_| CanonError::NonStringKey)?;
    CanonicalValue::try_from(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cv(value: serde_json::Value) -> CanonicalValue {
        CanonicalValue::try_from(value).unwrap()
    }

    #[test]
    fn object_keys_are_sorted() {
        let v = cv(json!({"b": 1, "a": 2, "c": 3}));
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":2,"b":1,"c":3}"#
        );
    }

    #[test]
    fn arrays_preserve_order() {
        let v = cv(json!([3, 1, 2]));
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "[3,1,2]");
    }

    #[test]
    fn floats_are_fixed_eight_decimals() {
        let v = CanonicalValue::Float(1.0);
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "1.00000000");
    }

    #[test]
    fn negative_zero_normalizes_to_zero() {
        let v = CanonicalValue::Float(-0.0);
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "0.00000000");
    }

    #[test]
    fn nan_and_infinity_are_rejected() {
        assert_eq!(
            canonicalize(&CanonicalValue::Float(f64::NAN)),
            Err(CanonError::NonFinite)
        );
        assert_eq!(
            canonicalize(&CanonicalValue::Float(f64::INFINITY)),
            Err(CanonError::NonFinite)
        );
    }

    #[test]
    fn strings_are_minimally_escaped() {
        let v = CanonicalValue::Str("a\"b\\c\nd".to_string());
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#""a\"b\\c\nd""#
        );
    }

    #[test]
    fn no_whitespace_or_trailing_newline() {
        let v = cv(json!({"a": [1, 2], "b": "x"}));
        let bytes = canonicalize(&v).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(!s.contains(' '));
        assert!(!s.ends_with('\n'));
    }

    #[test]
    fn fingerprint_is_deterministic_across_calls() {
        let v = cv(json!({"realm": "alpha", "lineage": 3}));
        let a = fingerprint(&v).unwrap();
        let b = fingerprint(&v).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_for_key_order_irrelevant_but_value_relevant_changes() {
        let v1 = cv(json!({"a": 1, "b": 2}));
        let v2 = cv(json!({"b": 2, "a": 1}));
        assert_eq!(fingerprint(&v1).unwrap(), fingerprint(&v2).unwrap());

        let v3 = cv(json!({"a": 1, "b": 3}));
        assert_ne!(fingerprint(&v1).unwrap(), fingerprint(&v3).unwrap());
    }

    #[test]
    fn round_trip_parse_matches_original() {
        let v = cv(json!({"a": [1, 2, "x"], "b": true, "c": null}));
        let bytes = canonicalize(&v).unwrap();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed, v);
    }

    #[test]
    fn timestamp_validation_accepts_well_formed_values() {
        assert!(validate_timestamp_ms("2024-01-01T00:00:00.000Z").is_ok());
        assert!(validate_timestamp_ms("2024-01-01 00:00:00.000Z").is_err());
        assert!(validate_timestamp_ms("2024-01-01T00:00:00.000").is_err());
    }
}
