use async_trait::async_trait;
use crate::{MeasurementTable, Pm25Series, SensorError, SeriesKind, TimeWindow};

/// Trait for telemetry sources that supply raw readings for one sensor
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// May return an empty or partial table; that is not an error.
    async fn fetch(&self, sensor_index: u64, window: &TimeWindow) -> Result<MeasurementTable, SensorError>;
}

/// Trait for durable storage of fused PM2.5 series
#[async_trait]
pub trait SeriesSink: Send + Sync {
    async fn write(&self, sensor_name: &str, kind: SeriesKind, series: &Pm25Series) -> Result<(), SensorError>;
}
