//! Serialization helpers for common types.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serde serialization module for `DateTime<Utc>` as integer Unix millis.
///
/// Persisted rows and the default date transform encode timestamps as
/// integer milliseconds since the Unix epoch.
pub mod datetime_millis {
    use super::*;

    /// Serializes `DateTime<Utc>` as milliseconds since the Unix epoch (i64).
    pub fn serialize<S>(datetime: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        datetime.timestamp_millis().serialize(serializer)
    }

    /// Deserializes `DateTime<Utc>` from milliseconds since the Unix epoch (i64).
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = i64::deserialize(deserializer)?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {millis}")))
    }
}
