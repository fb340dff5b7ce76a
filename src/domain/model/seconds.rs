//! Serde helpers for time values stored as plain seconds.
//!
//! Encoding refuses NaN and infinities so they can never reach disk.
//! Decoding accepts anything JSON can hold for a number slot (including
//! `null`, which is what some writers emit for NaN) and maps every
//! non-finite or missing value to `0.0`.

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if !value.is_finite() {
        return Err(serde::ser::Error::custom(format!(
            "refusing to persist non-finite time value {}",
            value
        )));
    }
    serializer.serialize_f64(*value)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.filter(|v| v.is_finite()).unwrap_or(0.0))
}
