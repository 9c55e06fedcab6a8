//! Per-sensor job: fetch both windows, run quality control, persist.

use anyhow::Result;
use chrono::{DateTime, Utc};
use quality_control::{QcReport, QualityControlEngine};
use sensor_core::{Pm25Point, SensorInfo, SeriesKind, SeriesSink, TelemetrySource};
use serde::Serialize;
use std::sync::Arc;

/// What one sensor run produced
#[derive(Debug, Clone, Serialize)]
pub struct SensorSummary {
    pub sensor: String,
    pub reports: Vec<(SeriesKind, QcReport)>,
    /// Latest valid value of the 24h series
    pub last_reading: Option<Pm25Point>,
    pub alert: bool,
}

pub async fn process_sensor(
    source: &dyn TelemetrySource,
    engine: &QualityControlEngine,
    sinks: &[Arc<dyn SeriesSink>],
    sensor: &SensorInfo,
    now: DateTime<Utc>,
    alert_threshold: f64,
    dry_run: bool,
) -> Result<SensorSummary> {
    let day_window = SeriesKind::Last24h.window(now);
    let week_window = SeriesKind::Last7d.window(now);

    // Fetch both windows concurrently
    let (day, week) = tokio::join!(
        source.fetch(sensor.sensor_index, &day_window),
        source.fetch(sensor.sensor_index, &week_window),
    );
    let tables = [(SeriesKind::Last24h, day?), (SeriesKind::Last7d, week?)];

    let mut summary = SensorSummary {
        sensor: sensor.name.clone(),
        reports: Vec::with_capacity(tables.len()),
        last_reading: None,
        alert: false,
    };

    for (kind, table) in tables {
        let result = engine.process_with_report(&table);
        if result.report.insufficient_data {
            tracing::warn!(
                "{} ({}): insufficient data, {} usable rows of {}",
                sensor.name,
                kind.label(),
                result.report.usable_rows,
                result.report.input_rows
            );
        }

        if kind == SeriesKind::Last24h {
            summary.last_reading = result.series.last_valid();
        }

        if !dry_run {
            for sink in sinks {
                sink.write(&sensor.name, kind, &result.series).await?;
            }
        }
        summary.reports.push((kind, result.report));
    }

    if let Some(last) = summary.last_reading {
        if last.value > alert_threshold {
            summary.alert = true;
            tracing::warn!(
                "{}: PM2.5 {:.1} µg/m³ at {} exceeds alert threshold {}",
                sensor.name,
                last.value,
                last.timestamp,
                alert_threshold
            );
        }
    }

    Ok(summary)
}
