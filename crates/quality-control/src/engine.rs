use rayon::prelude::*;
use sensor_core::{MeasurementTable, Pm25Series, QcOutcome, SensorError, SensorInfo};
use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::filters::{clean_in_place, CleaningCounts};
use crate::fusion::{channel_mean, fuse_channels, pm25_channels};

/// Rows with at least one reading needed before the engine emits any value
pub const MIN_USABLE_ROWS: usize = 2;

/// Engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QcConfig {
    /// Maximum tolerated `|A - B| / mean` for fused PM2.5
    pub ratio_threshold: f64,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self { ratio_threshold: 0.6 }
    }
}

impl QcConfig {
    pub fn new(ratio_threshold: f64) -> Result<Self, SensorError> {
        if !ratio_threshold.is_finite() || ratio_threshold < 0.0 {
            return Err(SensorError::InvalidConfig(format!(
                "ratio threshold must be a non-negative number, got {}",
                ratio_threshold
            )));
        }
        Ok(Self { ratio_threshold })
    }
}

/// Per-run diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QcReport {
    pub input_rows: usize,
    /// Rows that are not entirely NaN
    pub usable_rows: usize,
    pub complete_rows: usize,
    pub cleaning: CleaningCounts,
    pub channel_disagreements: usize,
    pub valid_points: usize,
    pub insufficient_data: bool,
}

/// Series plus what happened to each point
#[derive(Debug, Clone, Default)]
pub struct QcResult {
    pub series: Pm25Series,
    pub outcomes: Vec<QcOutcome>,
    pub report: QcReport,
}

/// Quality control and calibration engine.
///
/// Stateless between calls; each call works on its own copy of the table.
#[derive(Debug, Clone, Default)]
pub struct QualityControlEngine {
    config: QcConfig,
    calibration: Calibration,
}

impl QualityControlEngine {
    pub fn new(config: QcConfig) -> Self {
        Self { config, calibration: Calibration::default() }
    }

    pub fn with_calibration(config: QcConfig, calibration: Calibration) -> Self {
        Self { config, calibration }
    }

    pub fn config(&self) -> &QcConfig {
        &self.config
    }

    pub fn process(&self, table: &MeasurementTable) -> Pm25Series {
        self.process_with_report(table).series
    }

    /// Clean, calibrate and fuse one sensor's table
    pub fn process_with_report(&self, table: &MeasurementTable) -> QcResult {
        let mut report = QcReport {
            input_rows: table.len(),
            usable_rows: table.non_blank_rows(),
            complete_rows: table.complete_rows(),
            ..Default::default()
        };

        if report.usable_rows < MIN_USABLE_ROWS {
            report.insufficient_data = true;
            tracing::debug!(
                "Insufficient data: {} usable rows of {}",
                report.usable_rows,
                report.input_rows
            );
            return QcResult {
                series: Pm25Series::nan(&table.timestamps()),
                outcomes: vec![QcOutcome::InsufficientData; table.len()],
                report,
            };
        }

        let mut records = table.records().to_vec();
        report.cleaning = clean_in_place(&mut records);

        let mut outcomes = Vec::with_capacity(records.len());
        let mut points = Vec::with_capacity(records.len());
        for record in &records {
            let calibrated = self.calibration.apply(record);
            let (a, b) = pm25_channels(&calibrated);
            let value = fuse_channels(a, b, self.config.ratio_threshold);

            let outcome = if record.is_blank() || channel_mean(a, b).is_nan() {
                QcOutcome::InvalidReading
            } else if value.is_nan() {
                report.channel_disagreements += 1;
                QcOutcome::ChannelDisagreement
            } else {
                report.valid_points += 1;
                QcOutcome::Valid
            };

            outcomes.push(outcome);
            points.push(sensor_core::Pm25Point { timestamp: record.timestamp, value });
        }

        tracing::debug!(
            "QC: {} rows, blanked cf<atm={} order={} negative={} order2={}, disagreements={}, valid={}",
            report.input_rows,
            report.cleaning.cf_below_atm,
            report.cleaning.particle_order,
            report.cleaning.negative,
            report.cleaning.particle_order_second_pass,
            report.channel_disagreements,
            report.valid_points
        );

        QcResult {
            series: Pm25Series::new(points),
            outcomes,
            report,
        }
    }

    /// Process many sensors in parallel; each table is independent
    pub fn process_batch(
        &self,
        batch: Vec<(SensorInfo, MeasurementTable)>,
    ) -> Vec<(SensorInfo, QcResult)> {
        batch
            .into_par_iter()
            .map(|(sensor, table)| {
                let result = self.process_with_report(&table);
                (sensor, result)
            })
            .collect()
    }
}
