//! Persistence sinks for fused PM2.5 series.

pub mod csv_sink;
pub mod sqlite_sink;

pub use csv_sink::{read_series, CsvSeriesSink};
pub use sqlite_sink::SqliteSeriesSink;

use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
