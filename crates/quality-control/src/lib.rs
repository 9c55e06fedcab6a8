//! Quality control and calibration for dual-channel PM sensors.
//!
//! Turns a raw `MeasurementTable` into a single fused PM2.5 series:
//! consistency filters blank implausible rows, an affine calibration is
//! applied to the cf readings, and channels A/B are fused with a
//! disagreement check.

pub mod calibration;
pub mod engine;
pub mod filters;
pub mod fusion;


pub use calibration::*;
pub use engine::*;
pub use filters::*;
pub use fusion::*;

use sensor_core::{MeasurementTable, Pm25Series};

/// Run the full pipeline with default calibration and the given ratio threshold
pub fn process(table: &MeasurementTable, ratio_threshold: f64) -> Pm25Series {
    QualityControlEngine::new(QcConfig { ratio_threshold }).process(table)
}
