//! Normalization of the two wire representations of an instant.
//!
//! The backend sends either a component array `[year, month, day, hour,
//! minute, second, nanos]` (month is the calendar month, 1 = January) or an
//! ISO-like string. Both become a [`Timestamp`] at the ingestion boundary;
//! nothing downstream looks at the wire form again.

use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Rendered in place of a timestamp that could not be normalized.
pub const INVALID_DATE: &str = "Invalid date";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Canonical instant: local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(Local::now().naive_local())
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// `[y, m, d]` up to `[y, m, d, h, min, s, nanos]`. Trailing zero
    /// components may be omitted by the serializer, so 3 to 7 elements are
    /// accepted and the missing ones read as zero.
    pub fn from_components(parts: &[i64]) -> Option<Self> {
        if !(3..=7).contains(&parts.len()) {
            return None;
        }
        let part = |i: usize| -> Option<u32> {
            u32::try_from(parts.get(i).copied().unwrap_or(0)).ok()
        };

        let year = i32::try_from(parts[0]).ok()?;
        let date = NaiveDate::from_ymd_opt(year, part(1)?, part(2)?)?;
        let time = NaiveTime::from_hms_nano_opt(part(3)?, part(4)?, part(5)?, part(6)?)?;
        Some(Self(date.and_time(time)))
    }

    /// RFC 3339 (converted to local time), naive date-times, or a bare date.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(Self(dt.with_timezone(&Local).naive_local()));
        }

        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return Some(Self(naive));
            }
        }

        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(|date| Self(date.and_time(NaiveTime::MIN)))
    }

    fn from_epoch_millis(millis: i64) -> Option<Self> {
        Local
            .timestamp_millis_opt(millis)
            .single()
            .map(|dt| Self(dt.naive_local()))
    }

    /// The single ingestion entry point. Anything unrecognized is `None`.
    pub fn normalize(raw: &Value) -> Option<Self> {
        match raw {
            Value::Array(items) => {
                let parts: Option<Vec<i64>> = items.iter().map(Value::as_i64).collect();
                Self::from_components(&parts?)
            }
            Value::String(text) => Self::parse(text),
            Value::Number(n) => n.as_i64().and_then(Self::from_epoch_millis),
            _ => None,
        }
    }

    pub fn is_same_day(&self, other: &Timestamp) -> bool {
        self.0.date() == other.0.date()
    }

    /// 24-hour `HH:MM`.
    pub fn time_of_day(&self) -> String {
        self.0.format("%H:%M").to_string()
    }

    /// Abbreviated `Mon D`, e.g. `Jul 3`.
    pub fn short_date(&self) -> String {
        self.0.format("%b %-d").to_string()
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(value: NaiveDateTime) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Render an optional instant, falling back to [`INVALID_DATE`].
pub fn describe(ts: Option<&Timestamp>) -> String {
    ts.map(ToString::to_string)
        .unwrap_or_else(|| INVALID_DATE.to_string())
}

/// Serde adapter for `Option<Timestamp>` fields: accepts either wire form and
/// never fails, malformed input becomes `None`.
pub mod lenient {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(Timestamp::normalize))
    }

    pub fn serialize<S>(value: &Option<Timestamp>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_string()),
            None => serializer.serialize_none(),
        }
    }
}
