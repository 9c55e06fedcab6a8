//! Fusing channel A and B into one PM2.5 value.

use sensor_core::{Channel, Field, ParticleSize, Pm25Point, Pm25Series, RawRecord};

/// Mean of the two channels, skipping a missing one. NaN only if both are missing.
pub fn channel_mean(a: f64, b: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => (a + b) / 2.0,
        (false, true) => a,
        (true, false) => b,
        (true, true) => f64::NAN,
    }
}

/// Relative disagreement `|a - b| / mean`; NaN when either channel is missing
pub fn disagreement_ratio(a: f64, b: f64) -> f64 {
    (a - b).abs() / channel_mean(a, b)
}

/// Fused value, or NaN when the channels disagree beyond `ratio_threshold`
pub fn fuse_channels(a: f64, b: f64, ratio_threshold: f64) -> f64 {
    if disagreement_ratio(a, b) > ratio_threshold {
        f64::NAN
    } else {
        channel_mean(a, b)
    }
}

pub(crate) fn pm25_channels(record: &RawRecord) -> (f64, f64) {
    (
        record.get(Field::cf(ParticleSize::Pm2_5, Channel::A)),
        record.get(Field::cf(ParticleSize::Pm2_5, Channel::B)),
    )
}

/// Fuse calibrated pm2.5 cf readings into the output series
pub fn fuse_pm25(records: &[RawRecord], ratio_threshold: f64) -> Pm25Series {
    Pm25Series::new(
        records
            .iter()
            .map(|r| {
                let (a, b) = pm25_channels(r);
                Pm25Point {
                    timestamp: r.timestamp,
                    value: fuse_channels(a, b, ratio_threshold),
                }
            })
            .collect(),
    )
}
