//! Lenient deserializers for vendor payloads that mix strings and numbers.

use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

/// Accepts `123` and `"123"` alike.
pub fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected id, got {other}"))),
    }
}

/// Accepts `10.5` and `"10.5"` alike.
pub fn flexible_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| de::Error::custom("number out of range")),
        Value::String(s) => s.trim().parse().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("expected number, got {other}"))),
    }
}

/// [`flexible_f64`] for optional fields; `null` maps to `None`.
pub fn optional_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "flexible_f64")] f64);
    Ok(Option::<Wrapper>::deserialize(d)?.map(|Wrapper(v)| v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        #[serde(deserialize_with = "flexible_f64")]
        price: f64,
    }

    #[test]
    fn test_accepts_both_shapes() {
        let a: Sample = serde_json::from_str(r#"{"id": 7, "price": "1.25"}"#).unwrap();
        let b: Sample = serde_json::from_str(r#"{"id": "7", "price": 1.25}"#).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.price, b.price);
    }

    #[test]
    fn test_rejects_other_shapes() {
        assert!(serde_json::from_str::<Sample>(r#"{"id": null, "price": 1}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"id": 1, "price": "abc"}"#).is_err());
    }
}
