// =============================================================================
// Serde adapter for ratio fields that may be non-finite
// =============================================================================
//
// Distances and slopes divide by prices, so a zero price yields `inf` or
// `NaN` inside `Some(..)`.  JSON has no such numbers and serde_json would
// write them as `null`, indistinguishable from a value that is undefined.
// This adapter keeps the two apart on the wire:
//
//   None            -> null
//   Some(finite)    -> number
//   Some(+inf/-inf) -> "inf" / "-inf"
//   Some(NaN)       -> "NaN"
//
// Use with `#[serde(default, with = "crate::indicators::non_finite")]`.
// =============================================================================

use serde::{de, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        None => serializer.serialize_none(),
        Some(v) if v.is_nan() => serializer.serialize_str("NaN"),
        Some(v) if v.is_infinite() => {
            serializer.serialize_str(if *v > 0.0 { "inf" } else { "-inf" })
        }
        Some(v) => serializer.serialize_f64(*v),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Encoded {
    Number(f64),
    Text(String),
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Encoded>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Encoded::Number(v)) => Ok(Some(v)),
        Some(Encoded::Text(text)) => match text.as_str() {
            "inf" => Ok(Some(f64::INFINITY)),
            "-inf" => Ok(Some(f64::NEG_INFINITY)),
            "NaN" => Ok(Some(f64::NAN)),
            other => Err(de::Error::custom(format!(
                "expected a number, \"inf\", \"-inf\" or \"NaN\", got {:?}",
                other
            ))),
        },
    }
}
