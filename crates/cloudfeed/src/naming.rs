//! Output file naming.
//!
//! Every object the sink writes lives under a date partition and starts with
//! a fixed-width rendering of a timestamp, so that a plain lexicographic
//! listing of the bucket is also a chronological listing:
//!
//! ```text
//! 2019-01-01/201901010000000000000000000000000.RESOLVED
//! 2019-01-01/201901010000000000000000000000000_orders_1_1_1_000000000000_sess.ndjson
//! ```
//!
//! Data files use `_` after the timestamp and resolved markers use `.`.
//! Because `.` (0x2E) sorts before `_` (0x5F), a data file whose watermark
//! equals a resolved timestamp sorts after that timestamp's marker: it
//! belongs to the interval that the marker opens, not the one it closes.

use std::fmt;

use chrono::{Datelike, NaiveDate, Timelike};
use object_store::path::Path;

use crate::hlc::Timestamp;

/// Suffix of resolved timestamp marker files.
pub const RESOLVED_SUFFIX: &str = ".RESOLVED";

/// Length of a formatted timestamp: 14 date-time, 9 nanosecond and 10 logical digits.
pub const FORMATTED_TIMESTAMP_LEN: usize = 14 + 9 + 10;

/// Render `ts` as `YYYYMMDDHHMMSSNNNNNNNNNLLLLLLLLLL` (UTC, zero padded).
///
/// A negative logical component renders as zero.
pub fn format_timestamp(ts: Timestamp) -> String {
    let t = ts.to_datetime();
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}{:09}{:010}",
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
        t.nanosecond(),
        ts.logical.max(0)
    )
}

/// Inverse of [`format_timestamp`]. Returns `None` unless `s` is exactly a
/// formatted timestamp.
pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    if s.len() != FORMATTED_TIMESTAMP_LEN || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let field = |range: std::ops::Range<usize>| s[range].parse::<u32>().ok();
    let date = NaiveDate::from_ymd_opt(field(0..4)? as i32, field(4..6)?, field(6..8)?)?;
    let datetime = date
        .and_hms_nano_opt(field(8..10)?, field(10..12)?, field(12..14)?, field(14..23)?)?
        .and_utc();
    let logical = s[23..].parse::<i32>().ok()?;

    let wall_time = datetime.timestamp_nanos_opt()?;
    Some(Timestamp::new(wall_time, logical))
}

/// Calendar date (UTC) of `ts` as `YYYY-MM-DD`, used as the directory prefix.
pub fn date_partition(ts: Timestamp) -> String {
    let t = ts.to_datetime();
    format!("{:04}-{:02}-{:02}", t.year(), t.month(), t.day())
}

/// Path of the resolved marker for `ts`: `<date>/<ts>.RESOLVED`.
pub fn build_resolved_path(ts: Timestamp) -> Path {
    Path::from(format!(
        "{}/{}{RESOLVED_SUFFIX}",
        date_partition(ts),
        format_timestamp(ts)
    ))
}

/// Components of a data file name.
///
/// `node_id`, `sink_id`, `file_id` and `session_id` together keep files from
/// different nodes, sinks, and job executions from overwriting each other.
#[derive(Debug, Clone, Copy)]
pub struct DataFileName<'a> {
    /// Watermark of the buffer the file was cut from.
    pub least_resolved: Timestamp,
    pub topic: &'a str,
    pub schema_version: u32,
    pub node_id: i32,
    pub sink_id: i64,
    pub file_id: i64,
    pub session_id: &'a str,
    /// Extension including the leading dot, e.g. `.ndjson`.
    pub extension: &'a str,
}

impl DataFileName<'_> {
    /// Full path: `<date>/<ts>_<topic>_<schema>_<node>_<sink>_<file:012>_<session><ext>`.
    pub fn to_path(&self) -> Path {
        Path::from(format!("{}/{self}", date_partition(self.least_resolved)))
    }
}

impl fmt::Display for DataFileName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // File IDs are padded so files from one sink at the same timestamp
        // still list in creation order.
        write!(
            f,
            "{}_{}_{}_{}_{}_{:012}_{}{}",
            format_timestamp(self.least_resolved),
            self.topic,
            self.schema_version,
            self.node_id,
            self.sink_id,
            self.file_id,
            self.session_id,
            self.extension
        )
    }
}

/// Timestamp encoded in a resolved marker's file name, if `path` is one.
pub fn resolved_timestamp_of(path: &str) -> Option<Timestamp> {
    let name = path.rsplit('/').next()?;
    parse_timestamp(name.strip_suffix(RESOLVED_SUFFIX)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[allow(clippy::too_many_arguments)]
    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, nanos: u32, logical: i32) -> Timestamp {
        let dt = Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap();
        Timestamp::new(dt.timestamp_nanos_opt().unwrap() + i64::from(nanos), logical)
    }

    fn data_path(at: Timestamp, sink_id: i64, file_id: i64) -> String {
        DataFileName {
            least_resolved: at,
            topic: "orders",
            schema_version: 1,
            node_id: 1,
            sink_id,
            file_id,
            session_id: "sess",
            extension: ".ndjson",
        }
        .to_path()
        .to_string()
    }

    #[test]
    fn test_format_timestamp_fixed_width() {
        let t = ts(2019, 1, 2, 3, 4, 5, 6, 7);
        let formatted = format_timestamp(t);
        assert_eq!(formatted, "201901020304050000000060000000007");
        assert_eq!(formatted.len(), FORMATTED_TIMESTAMP_LEN);

        assert_eq!(
            format_timestamp(Timestamp::MIN),
            "197001010000000000000000000000000"
        );
    }

    #[test]
    fn test_negative_logical_keeps_width_and_order() {
        let base = ts(2019, 1, 2, 3, 4, 5, 6, 0);
        let negative = Timestamp::new(base.wall_time, -1);
        let formatted = format_timestamp(negative);

        assert_eq!(formatted.len(), FORMATTED_TIMESTAMP_LEN);
        assert!(formatted.bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(formatted, format_timestamp(base));
        assert!(formatted < format_timestamp(Timestamp::new(base.wall_time, 1)));
    }

    #[test]
    fn test_parse_timestamp_inverts_format() {
        for t in [
            Timestamp::MIN,
            ts(2019, 1, 2, 3, 4, 5, 6, 7),
            ts(2024, 2, 29, 23, 59, 59, 999_999_999, i32::MAX),
        ] {
            assert_eq!(parse_timestamp(&format_timestamp(t)), Some(t));
        }
    }

    #[test]
    fn test_parse_timestamp_rejects_malformed() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("20190102"), None);
        assert_eq!(parse_timestamp("2019013203040500000000600000000x7"), None);
        // Month 13.
        assert_eq!(parse_timestamp("201913020304050000000060000000007"), None);
    }

    #[test]
    fn test_logical_tie_break_orders_lexicographically() {
        let wall = ts(2019, 6, 1, 12, 0, 0, 500, 0).wall_time;
        let mut previous = format_timestamp(Timestamp::new(wall, 0));
        for logical in [1, 2, 9, 10, 99, 1_000, i32::MAX] {
            let current = format_timestamp(Timestamp::new(wall, logical));
            assert!(previous < current, "{previous} !< {current}");
            previous = current;
        }
    }

    #[test]
    fn test_date_partition() {
        assert_eq!(date_partition(ts(2019, 12, 31, 23, 59, 59, 0, 0)), "2019-12-31");
        assert_eq!(date_partition(ts(2020, 1, 1, 0, 0, 0, 0, 0)), "2020-01-01");
    }

    #[test]
    fn test_build_resolved_path() {
        let path = build_resolved_path(ts(2019, 1, 2, 3, 4, 5, 6, 7));
        assert_eq!(
            path.to_string(),
            "2019-01-02/201901020304050000000060000000007.RESOLVED"
        );
    }

    #[test]
    fn test_data_file_name_layout() {
        let path = data_path(ts(2019, 1, 2, 3, 4, 5, 6, 7), 3, 42);
        assert_eq!(
            path,
            "2019-01-02/201901020304050000000060000000007_orders_1_1_3_000000000042_sess.ndjson"
        );
    }

    #[test]
    fn test_data_file_sorts_after_marker_at_same_timestamp() {
        let t = ts(2019, 1, 2, 3, 4, 5, 6, 7);
        let marker = build_resolved_path(t).to_string();
        let data = data_path(t, 1, 0);
        assert!(marker < data);

        // But before the marker of any later timestamp.
        let later_marker = build_resolved_path(Timestamp::new(t.wall_time, t.logical + 1));
        assert!(data < later_marker.to_string());
    }

    #[test]
    fn test_paths_are_monotonic_in_timestamp() {
        let times = [
            Timestamp::MIN,
            ts(2019, 1, 1, 0, 0, 0, 0, 0),
            ts(2019, 1, 1, 0, 0, 0, 0, 1),
            ts(2019, 1, 1, 0, 0, 0, 1, 0),
            ts(2019, 1, 1, 23, 59, 59, 999_999_999, 5),
            ts(2019, 1, 2, 0, 0, 0, 0, 0),
            ts(2020, 10, 1, 0, 0, 0, 0, 0),
        ];
        for pair in times.windows(2) {
            let (t1, t2) = (pair[0], pair[1]);
            let candidates1 = [build_resolved_path(t1).to_string(), data_path(t1, 9, 999)];
            let candidates2 = [build_resolved_path(t2).to_string(), data_path(t2, 1, 0)];
            for p1 in &candidates1 {
                for p2 in &candidates2 {
                    assert!(p1 <= p2, "{p1} > {p2}");
                }
            }
        }
    }

    #[test]
    fn test_file_id_padding_keeps_creation_order() {
        let t = ts(2019, 1, 1, 0, 0, 0, 0, 0);
        assert!(data_path(t, 1, 9) < data_path(t, 1, 10));
        assert!(data_path(t, 1, 99_999) < data_path(t, 1, 100_000));
    }

    #[test]
    fn test_resolved_timestamp_of() {
        let t = ts(2019, 1, 2, 3, 4, 5, 6, 7);
        assert_eq!(
            resolved_timestamp_of(build_resolved_path(t).as_ref()),
            Some(t)
        );
        assert_eq!(resolved_timestamp_of(&data_path(t, 1, 0)), None);
    }
}
