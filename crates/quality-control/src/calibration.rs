//! Field calibration of cf readings.

use sensor_core::{Channel, Field, ParticleSize, RawRecord};
use serde::{Deserialize, Serialize};

/// Linear correction `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineCoefficients {
    pub slope: f64,
    pub intercept: f64,
}

impl AffineCoefficients {
    pub const fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        x * self.slope + self.intercept
    }
}

/// Per-bucket calibration, shared by both channels.
///
/// After the affine map, calibrated pm1.0 values below
/// `low_range_threshold` get `low_range_offset` added back: the primary fit
/// overshoots in the low range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub pm1_0: AffineCoefficients,
    pub pm2_5: AffineCoefficients,
    pub pm10_0: AffineCoefficients,
    pub low_range_threshold: f64,
    pub low_range_offset: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pm1_0: AffineCoefficients::new(0.52, -0.18),
            pm2_5: AffineCoefficients::new(0.42, 0.26),
            pm10_0: AffineCoefficients::new(0.45, 0.02),
            low_range_threshold: 16.0,
            low_range_offset: 0.18,
        }
    }
}

impl Calibration {
    pub fn coefficients(&self, size: ParticleSize) -> AffineCoefficients {
        match size {
            ParticleSize::Pm1_0 => self.pm1_0,
            ParticleSize::Pm2_5 => self.pm2_5,
            ParticleSize::Pm10_0 => self.pm10_0,
        }
    }

    /// Calibrate the six cf fields of one record; atm fields pass through
    pub fn apply(&self, record: &RawRecord) -> RawRecord {
        let mut out = record.clone();
        for size in ParticleSize::ALL {
            let coefficients = self.coefficients(size);
            for channel in Channel::ALL {
                let field = Field::cf(size, channel);
                out.set(field, coefficients.apply(record.get(field)));
            }
        }
        for channel in Channel::ALL {
            let field = Field::cf(ParticleSize::Pm1_0, channel);
            let value = out.get(field);
            if value < self.low_range_threshold {
                out.set(field, value + self.low_range_offset);
            }
        }
        out
    }
}

/// Calibrate every record with the default coefficients
pub fn calibrate(records: &[RawRecord]) -> Vec<RawRecord> {
    let calibration = Calibration::default();
    records.iter().map(|r| calibration.apply(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cf_record(pm1: f64, pm25: f64, pm10: f64) -> RawRecord {
        let mut r = RawRecord::nan(Default::default());
        for channel in Channel::ALL {
            r.set(Field::cf(ParticleSize::Pm1_0, channel), pm1);
            r.set(Field::cf(ParticleSize::Pm2_5, channel), pm25);
            r.set(Field::cf(ParticleSize::Pm10_0, channel), pm10);
            r.set(Field::atm(ParticleSize::Pm2_5, channel), 7.0);
        }
        r
    }

    #[test]
    fn test_zero_pm1_comes_back_to_zero() {
        let out = calibrate(&[cf_record(0.0, 0.0, 0.0)]);
        // -0.18 is in the low range, so 0.18 is added back
        assert_eq!(out[0].get(Field::cf(ParticleSize::Pm1_0, Channel::A)), 0.0);
        assert_eq!(out[0].get(Field::cf(ParticleSize::Pm1_0, Channel::B)), 0.0);
    }

    #[test]
    fn test_bucket_coefficients() {
        let out = Calibration::default().apply(&cf_record(10.0, 20.0, 40.0));

        assert_relative_eq!(out.get(Field::cf(ParticleSize::Pm1_0, Channel::A)), 5.2, epsilon = 1e-9);
        assert_relative_eq!(out.get(Field::cf(ParticleSize::Pm2_5, Channel::B)), 8.66, epsilon = 1e-9);
        assert_relative_eq!(out.get(Field::cf(ParticleSize::Pm10_0, Channel::A)), 18.02, epsilon = 1e-9);
        // atm untouched
        assert_eq!(out.get(Field::atm(ParticleSize::Pm2_5, Channel::A)), 7.0);
    }

    #[test]
    fn test_high_range_pm1_not_corrected() {
        let out = Calibration::default().apply(&cf_record(100.0, 120.0, 150.0));
        assert_relative_eq!(out.get(Field::cf(ParticleSize::Pm1_0, Channel::B)), 51.82, epsilon = 1e-9);
    }

    #[test]
    fn test_correction_only_touches_pm1() {
        // calibrated pm2.5 is below 16 but gets no offset
        let out = Calibration::default().apply(&cf_record(1.0, 1.0, 1.0));
        assert_relative_eq!(out.get(Field::cf(ParticleSize::Pm2_5, Channel::A)), 0.68, epsilon = 1e-9);
        assert_relative_eq!(out.get(Field::cf(ParticleSize::Pm1_0, Channel::A)), 0.52, epsilon = 1e-9);
    }

    #[test]
    fn test_nan_stays_nan() {
        let out = calibrate(&[RawRecord::nan(Default::default())]);
        assert!(out[0].is_blank());
    }
}
