//! Hybrid logical clock timestamps.
//!
//! A timestamp pairs a physical wall-clock reading (nanoseconds since the
//! Unix epoch) with a logical counter that orders events sharing the same
//! wall-clock value. The textual form is the database's decimal rendering,
//! `<wall_time>.<logical>` with the logical part padded to ten digits.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::prelude::*;

/// Width of the logical component in the decimal rendering.
const LOGICAL_DIGITS: usize = 10;

/// A hybrid logical timestamp.
///
/// Ordering is lexicographic on `(wall_time, logical)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Nanoseconds since the Unix epoch.
    pub wall_time: i64,
    /// Tie-breaker for events at the same wall time.
    pub logical: i32,
}

impl Timestamp {
    /// The zero timestamp.
    pub const MIN: Timestamp = Timestamp {
        wall_time: 0,
        logical: 0,
    };

    pub const fn new(wall_time: i64, logical: i32) -> Self {
        Self { wall_time, logical }
    }

    /// Wall-clock component as a UTC datetime.
    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.wall_time)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.wall_time,
            self.logical,
            width = LOGICAL_DIGITS
        )
    }
}

/// Error returned when a timestamp string cannot be parsed.
#[derive(Debug, Snafu)]
#[snafu(display("invalid timestamp '{input}': expected <wall_nanos>[.<logical>]"))]
pub struct ParseTimestampError {
    input: String,
}

impl FromStr for Timestamp {
    type Err = ParseTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (wall, logical) = s.split_once('.').unwrap_or((s, "0"));

        let digits_only = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        ensure!(
            digits_only(wall.trim_start_matches('-')) && digits_only(logical),
            ParseTimestampSnafu { input: s }
        );

        let wall_time = wall.parse().ok().context(ParseTimestampSnafu { input: s })?;
        let logical = logical
            .parse()
            .ok()
            .context(ParseTimestampSnafu { input: s })?;

        Ok(Timestamp { wall_time, logical })
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
