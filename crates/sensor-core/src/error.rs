use thiserror::Error;

/// Structural failures surfaced to callers.
///
/// Data-quality problems (implausible readings, channel disagreement, too few
/// rows) are never errors; they show up as NaN in the output series.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}
