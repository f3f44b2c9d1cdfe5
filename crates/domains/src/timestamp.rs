//! # Timestamps
//!
//! Every timestamp is persisted as an RFC 3339 string with fixed microsecond
//! precision and a `Z` suffix. Fixed width keeps lexical and chronological
//! order identical, which is what adapters sort on.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Current time truncated to the persisted precision.
///
/// Truncating up front means a value read back from the store compares equal
/// to the value that was written.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn format(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The persisted form as a JSON value, for use in mutations.
pub fn to_value(ts: &DateTime<Utc>) -> serde_json::Value {
    serde_json::Value::String(format(ts))
}

pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let fractional = whole + chrono::Duration::microseconds(1500);

        assert_eq!(format(&whole), "2024-03-01T12:00:00.000000Z");
        assert_eq!(format(&fractional), "2024-03-01T12:00:00.001500Z");
        assert!(format(&whole) < format(&fractional));
    }

    #[test]
    fn now_survives_a_round_trip() {
        let ts = now();
        let value = to_value(&ts);
        let parsed = DateTime::parse_from_rfc3339(value.as_str().unwrap()).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), ts);
    }
}
