use async_trait::async_trait;
use sensor_core::{Pm25Point, Pm25Series, SensorError, SeriesKind, SeriesSink, PM25_COLUMN};
use std::path::{Path, PathBuf};

use crate::{format_timestamp, parse_timestamp};

const TIME_COLUMN: &str = "time_stamp";

/// Writes one CSV per sensor and series kind: `{root}/{name}/{label}_{name}.csv`
#[derive(Debug, Clone)]
pub struct CsvSeriesSink {
    root: PathBuf,
}

impl CsvSeriesSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, sensor_name: &str, kind: SeriesKind) -> PathBuf {
        self.root
            .join(sensor_name)
            .join(format!("{}_{}.csv", kind.label(), sensor_name))
    }

    pub async fn read(&self, sensor_name: &str, kind: SeriesKind) -> Result<Pm25Series, SensorError> {
        let path = self.path_for(sensor_name, kind);
        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SensorError::StorageError(format!("{}: {}", path.display(), e)))?;
        parse_series(&data)
    }
}

/// Render a series as `time_stamp,pm2.5` CSV; NaN is an empty cell
pub fn render_series(series: &Pm25Series) -> Result<Vec<u8>, SensorError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([TIME_COLUMN, PM25_COLUMN])
        .map_err(|e| SensorError::StorageError(e.to_string()))?;

    for point in &series.points {
        let value = if point.value.is_nan() {
            String::new()
        } else {
            point.value.to_string()
        };
        writer
            .write_record([format_timestamp(&point.timestamp), value])
            .map_err(|e| SensorError::StorageError(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| SensorError::StorageError(e.to_string()))
}

/// Parse a persisted series. An empty file is an empty series.
pub fn parse_series(data: &str) -> Result<Pm25Series, SensorError> {
    if data.trim().is_empty() {
        return Ok(Pm25Series::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SensorError::ParseError(e.to_string()))?
        .clone();
    let time_idx = headers.iter().position(|h| h.trim() == TIME_COLUMN);
    let value_idx = headers.iter().position(|h| h.trim() == PM25_COLUMN);
    let (Some(time_idx), Some(value_idx)) = (time_idx, value_idx) else {
        return Err(SensorError::SchemaMismatch(format!(
            "expected {} and {} columns",
            TIME_COLUMN, PM25_COLUMN
        )));
    };

    let mut points = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| SensorError::ParseError(e.to_string()))?;
        let raw_ts = record.get(time_idx).unwrap_or("");
        let timestamp = parse_timestamp(raw_ts)
            .ok_or_else(|| SensorError::ParseError(format!("bad timestamp '{}'", raw_ts)))?;
        let value = record
            .get(value_idx)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(f64::NAN);
        points.push(Pm25Point { timestamp, value });
    }

    Ok(Pm25Series::new(points))
}

pub async fn read_series(path: impl AsRef<Path>) -> Result<Pm25Series, SensorError> {
    let path = path.as_ref();
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SensorError::StorageError(format!("{}: {}", path.display(), e)))?;
    parse_series(&data)
}

#[async_trait]
impl SeriesSink for CsvSeriesSink {
    async fn write(&self, sensor_name: &str, kind: SeriesKind, series: &Pm25Series) -> Result<(), SensorError> {
        let path = self.path_for(sensor_name, kind);
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| SensorError::StorageError(format!("{}: {}", dir.display(), e)))?;
                tracing::debug!("Created local directory {}", dir.display());
            }
        }

        let bytes = render_series(series)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| SensorError::StorageError(format!("{}: {}", path.display(), e)))?;

        tracing::info!("Wrote file: {}", path.display());
        Ok(())
    }
}
