//! Parsing of the sensor history CSV export.

use chrono::{DateTime, NaiveDateTime, Utc};
use sensor_core::{MeasurementTable, SensorError};

/// Index column of the history export
pub const TIME_COLUMN: &str = "time_stamp";

/// Parse a history CSV body into a measurement table.
///
/// An empty body yields an empty table. Blank or non-numeric cells become
/// NaN, and short rows are padded with NaN. Missing measurement columns are
/// a schema mismatch.
pub fn parse_history_csv(body: &str) -> Result<MeasurementTable, SensorError> {
    if body.trim().is_empty() {
        return Ok(MeasurementTable::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SensorError::ParseError(e.to_string()))?
        .clone();

    let time_idx = headers
        .iter()
        .position(|h| h == TIME_COLUMN)
        .ok_or_else(|| SensorError::SchemaMismatch(format!("missing index column {}", TIME_COLUMN)))?;

    let mut timestamps = Vec::new();
    let mut columns: Vec<(String, Vec<f64>)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != time_idx)
        .map(|(_, h)| (h.to_string(), Vec::new()))
        .collect();

    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| SensorError::ParseError(e.to_string()))?;
        let raw_ts = record.get(time_idx).unwrap_or("");
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
            SensorError::ParseError(format!("row {}: bad {} '{}'", line + 1, TIME_COLUMN, raw_ts))
        })?;
        timestamps.push(timestamp);

        let mut col = 0;
        for i in 0..headers.len() {
            if i == time_idx {
                continue;
            }
            columns[col].1.push(parse_value(record.get(i)));
            col += 1;
        }
    }

    MeasurementTable::from_columns(timestamps, columns)
}

fn parse_value(cell: Option<&str>) -> f64 {
    cell.and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Accepts unix seconds, RFC 3339, or `YYYY-MM-DD HH:MM:SS` taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sensor_core::{Channel, Field, ParticleSize, COLUMNS};

    fn header() -> String {
        format!("{},sensor_index,{}", TIME_COLUMN, COLUMNS.join(","))
    }

    #[test]
    fn test_parse_sorts_by_timestamp() {
        let body = format!(
            "{}\n\
             1705305600,131,1,1,2,2,3,3,1,1,2,2,3,3\n\
             1705305480,131,4,4,5,5,6,6,4,4,5,5,6,6\n",
            header()
        );

        let table = parse_history_csv(&body).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.timestamps()[0], Utc.timestamp_opt(1705305480, 0).unwrap());
        assert_eq!(table.records()[0].get(Field::cf(ParticleSize::Pm2_5, Channel::A)), 5.0);
    }

    #[test]
    fn test_blank_and_short_rows_become_nan() {
        let body = format!(
            "{}\n\
             2024-01-15T08:00:00Z,131,1,,2,2,3,3,1,1,2,2,3,3\n\
             2024-01-15T08:02:00Z,131,1,1,2\n",
            header()
        );

        let table = parse_history_csv(&body).unwrap();

        assert!(table.records()[0].get(Field::cf(ParticleSize::Pm1_0, Channel::B)).is_nan());
        assert!(table.records()[1].get(Field::atm(ParticleSize::Pm10_0, Channel::B)).is_nan());
        assert_eq!(table.records()[1].get(Field::cf(ParticleSize::Pm2_5, Channel::A)), 2.0);
        assert_eq!(table.complete_rows(), 0);
    }

    #[test]
    fn test_empty_body() {
        assert!(parse_history_csv("").unwrap().is_empty());
        assert!(parse_history_csv(&format!("{}\n", header())).unwrap().is_empty());
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let body = "time_stamp,pm2.5_cf_1_a,pm2.5_cf_1_b\n1705305600,1,1\n";
        assert!(matches!(parse_history_csv(body), Err(SensorError::SchemaMismatch(_))));

        let no_index = format!("{}\n", COLUMNS.join(","));
        assert!(matches!(parse_history_csv(&no_index), Err(SensorError::SchemaMismatch(_))));
    }

    #[test]
    fn test_bad_timestamp() {
        let body = format!("{}\nyesterday,131,1,1,2,2,3,3,1,1,2,2,3,3\n", header());
        assert!(matches!(parse_history_csv(&body), Err(SensorError::ParseError(_))));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        assert_eq!(parse_timestamp("1705305600"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15T10:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-15 08:00:00"), Some(expected));
        assert_eq!(parse_timestamp("n/a"), None);
    }
}
