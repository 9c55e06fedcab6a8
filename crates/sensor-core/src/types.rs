use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Field, SensorError, FIELD_COUNT};

/// One raw telemetry row: twelve readings in µg/m³, NaN where missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub timestamp: DateTime<Utc>,
    pub values: [f64; FIELD_COUNT],
}

impl RawRecord {
    pub fn new(timestamp: DateTime<Utc>, values: [f64; FIELD_COUNT]) -> Self {
        Self { timestamp, values }
    }

    /// A record with every field missing
    pub fn nan(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, [f64::NAN; FIELD_COUNT])
    }

    pub fn get(&self, field: Field) -> f64 {
        self.values[field.index()]
    }

    pub fn set(&mut self, field: Field, value: f64) {
        self.values[field.index()] = value;
    }

    /// Blank the whole row
    pub fn invalidate(&mut self) {
        self.values = [f64::NAN; FIELD_COUNT];
    }

    /// True when all twelve fields carry a number
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|v| !v.is_nan())
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.is_nan())
    }
}

/// Time-ordered raw readings for one sensor and one request window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementTable {
    records: Vec<RawRecord>,
}

impl MeasurementTable {
    /// Sorts ascending by timestamp. For repeated timestamps the first row wins.
    pub fn new(mut records: Vec<RawRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        records.dedup_by_key(|r| r.timestamp);
        Self { records }
    }

    /// Build a table from named columns.
    ///
    /// Columns outside the twelve known fields are ignored. Every known field
    /// must be present and each column must have one value per timestamp.
    pub fn from_columns(
        timestamps: Vec<DateTime<Utc>>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, SensorError> {
        let mut slots: [Option<Vec<f64>>; FIELD_COUNT] = Default::default();

        for (name, values) in columns {
            let Some(field) = Field::from_column(&name) else {
                continue;
            };
            if values.len() != timestamps.len() {
                return Err(SensorError::SchemaMismatch(format!(
                    "column {} has {} values for {} timestamps",
                    name,
                    values.len(),
                    timestamps.len()
                )));
            }
            slots[field.index()] = Some(values);
        }

        let missing: Vec<&str> = Field::ALL
            .iter()
            .filter(|f| slots[f.index()].is_none())
            .map(|f| f.column())
            .collect();
        if !missing.is_empty() {
            return Err(SensorError::SchemaMismatch(format!(
                "missing columns: {}",
                missing.join(", ")
            )));
        }

        let records = timestamps
            .into_iter()
            .enumerate()
            .map(|(row, ts)| {
                let mut values = [f64::NAN; FIELD_COUNT];
                for (i, slot) in slots.iter().enumerate() {
                    if let Some(column) = slot {
                        values[i] = column[row];
                    }
                }
                RawRecord::new(ts, values)
            })
            .collect();

        Ok(Self::new(records))
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RawRecord> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RawRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.records.iter().map(|r| r.timestamp).collect()
    }

    /// Rows with all twelve fields present
    pub fn complete_rows(&self) -> usize {
        self.records.iter().filter(|r| r.is_complete()).count()
    }

    /// Rows carrying at least one reading
    pub fn non_blank_rows(&self) -> usize {
        self.records.iter().filter(|r| !r.is_blank()).count()
    }
}

/// One fused PM2.5 value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pm25Point {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Final per-sensor output: one value (or NaN) per input timestamp
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pm25Series {
    pub points: Vec<Pm25Point>,
}

impl Pm25Series {
    pub fn new(points: Vec<Pm25Point>) -> Self {
        Self { points }
    }

    /// All-NaN series over the given timestamps
    pub fn nan(timestamps: &[DateTime<Utc>]) -> Self {
        Self {
            points: timestamps
                .iter()
                .map(|&timestamp| Pm25Point { timestamp, value: f64::NAN })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn valid_count(&self) -> usize {
        self.points.iter().filter(|p| !p.value.is_nan()).count()
    }

    /// Latest non-NaN point
    pub fn last_valid(&self) -> Option<Pm25Point> {
        self.points.iter().rev().find(|p| !p.value.is_nan()).copied()
    }

    /// Points strictly above an alert threshold
    pub fn exceedances(&self, threshold: f64) -> Vec<Pm25Point> {
        self.points.iter().filter(|p| p.value > threshold).copied().collect()
    }
}

/// Classification of each output point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QcOutcome {
    Valid,
    /// A consistency rule blanked the row
    InvalidReading,
    /// Channels A and B disagree beyond the ratio threshold
    ChannelDisagreement,
    /// Too few non-blank rows in the input to produce a signal
    InsufficientData,
}

/// Sensor entry from a region registry file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub sensor_index: u64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Which persisted series a window belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesKind {
    /// Raw readings over the last day
    Last24h,
    /// Hourly averages over the last week
    Last7d,
}

impl SeriesKind {
    pub const ALL: [SeriesKind; 2] = [SeriesKind::Last24h, SeriesKind::Last7d];

    pub fn label(&self) -> &'static str {
        match self {
            SeriesKind::Last24h => "24h",
            SeriesKind::Last7d => "7d",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        SeriesKind::ALL.iter().copied().find(|k| k.label() == label)
    }

    pub fn window(&self, now: DateTime<Utc>) -> TimeWindow {
        match self {
            SeriesKind::Last24h => TimeWindow::last_day(now),
            SeriesKind::Last7d => TimeWindow::last_week(now),
        }
    }
}

/// Half-open [start, end) request window, optionally pre-averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// 0 means raw readings
    pub average_minutes: u32,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, average_minutes: u32) -> Result<Self, SensorError> {
        if start >= end {
            return Err(SensorError::InvalidConfig(format!(
                "window start {} is not before end {}",
                start, end
            )));
        }
        Ok(Self { start, end, average_minutes })
    }

    pub fn last_day(now: DateTime<Utc>) -> Self {
        Self { start: now - Duration::days(1), end: now, average_minutes: 0 }
    }

    pub fn last_week(now: DateTime<Utc>) -> Self {
        Self { start: now - Duration::days(7), end: now, average_minutes: 60 }
    }
}
