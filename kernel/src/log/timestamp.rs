// Record Timestamps
//
// Timestamps are supplied by the caller but persisted in one canonical
// form: RFC 3339, UTC, `Z` suffix, fractional seconds only when present.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Point in time attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid timestamp `{input}`: {reason}")]
pub struct TimestampError {
    pub input: String,
    pub reason: String,
}

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse an RFC 3339 timestamp with any offset, normalizing to UTC.
    pub fn parse(input: &str) -> Result<Self, TimestampError> {
        DateTime::parse_from_rfc3339(input.trim())
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| TimestampError {
                input: input.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_is_utc_with_z_suffix() {
        let ts = Timestamp::parse("2024-03-01T10:00:00Z").unwrap();
        assert_eq!(ts.to_string(), "2024-03-01T10:00:00Z");
    }

    #[test]
    fn offsets_are_normalized() {
        let ts = Timestamp::parse("2024-03-01T12:30:00+02:00").unwrap();
        assert_eq!(ts.to_string(), "2024-03-01T10:30:00Z");
    }

    #[test]
    fn fractional_seconds_are_kept() {
        let ts: Timestamp = "2024-03-01T10:00:00.250Z".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-03-01T10:00:00.250Z");
    }

    #[test]
    fn free_text_is_rejected() {
        let err = Timestamp::parse("yesterday").unwrap_err();
        assert_eq!(err.input, "yesterday");
    }
}
