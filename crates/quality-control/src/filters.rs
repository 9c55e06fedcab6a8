//! Per-row consistency rules.
//!
//! Each rule inspects a few columns, and a row that trips it is blanked in
//! full. NaN comparisons are false, so missing values never trip a rule and
//! a blanked row never trips one again.

use sensor_core::{Channel, Field, ParticleSize, RawRecord};

/// Blank every row matching `rule`, returning how many rows were hit
pub(crate) fn invalidate_where<F>(records: &mut [RawRecord], rule: F) -> usize
where
    F: Fn(&RawRecord) -> bool,
{
    let mut hits = 0;
    for record in records.iter_mut() {
        if rule(record) {
            record.invalidate();
            hits += 1;
        }
    }
    hits
}

/// cf must never read below atm for the same bucket and channel
pub fn cf_below_atm(record: &RawRecord) -> bool {
    ParticleSize::ALL.iter().any(|&size| {
        Channel::ALL.iter().any(|&channel| {
            record.get(Field::cf(size, channel)) < record.get(Field::atm(size, channel))
        })
    })
}

/// Cumulative mass must not decrease with bucket size, checked on cf per channel
pub fn particle_order_violated(record: &RawRecord) -> bool {
    Channel::ALL.iter().any(|&channel| {
        let pm1 = record.get(Field::cf(ParticleSize::Pm1_0, channel));
        let pm25 = record.get(Field::cf(ParticleSize::Pm2_5, channel));
        let pm10 = record.get(Field::cf(ParticleSize::Pm10_0, channel));
        pm1 > pm25 || pm1 > pm10 || pm25 > pm10
    })
}

pub fn has_negative_cf(record: &RawRecord) -> bool {
    ParticleSize::ALL.iter().any(|&size| {
        Channel::ALL
            .iter()
            .any(|&channel| record.get(Field::cf(size, channel)) < 0.0)
    })
}

pub fn filter_cf_below_atm(records: &[RawRecord]) -> Vec<RawRecord> {
    let mut out = records.to_vec();
    invalidate_where(&mut out, cf_below_atm);
    out
}

pub fn filter_particle_order(records: &[RawRecord]) -> Vec<RawRecord> {
    let mut out = records.to_vec();
    invalidate_where(&mut out, particle_order_violated);
    out
}

pub fn filter_negative(records: &[RawRecord]) -> Vec<RawRecord> {
    let mut out = records.to_vec();
    invalidate_where(&mut out, has_negative_cf);
    out
}

/// Rows blanked by each cleaning stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CleaningCounts {
    pub cf_below_atm: usize,
    pub particle_order: usize,
    pub negative: usize,
    pub particle_order_second_pass: usize,
}

impl CleaningCounts {
    pub fn total(&self) -> usize {
        self.cf_below_atm + self.particle_order + self.negative + self.particle_order_second_pass
    }
}

/// Stages 1-4 in place. The ordering rule runs exactly twice: before and
/// after the negative-value rule.
pub(crate) fn clean_in_place(records: &mut [RawRecord]) -> CleaningCounts {
    CleaningCounts {
        cf_below_atm: invalidate_where(records, cf_below_atm),
        particle_order: invalidate_where(records, particle_order_violated),
        negative: invalidate_where(records, has_negative_cf),
        particle_order_second_pass: invalidate_where(records, particle_order_violated),
    }
}

/// All cleaning stages, in order
pub fn clean(records: &[RawRecord]) -> Vec<RawRecord> {
    let mut out = records.to_vec();
    clean_in_place(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_core::FIELD_COUNT;

    fn record(a: (f64, f64, f64), b: (f64, f64, f64)) -> RawRecord {
        let mut r = RawRecord::nan(Default::default());
        for (channel, (pm1, pm25, pm10)) in [(Channel::A, a), (Channel::B, b)] {
            r.set(Field::cf(ParticleSize::Pm1_0, channel), pm1);
            r.set(Field::cf(ParticleSize::Pm2_5, channel), pm25);
            r.set(Field::cf(ParticleSize::Pm10_0, channel), pm10);
            r.set(Field::atm(ParticleSize::Pm1_0, channel), pm1);
            r.set(Field::atm(ParticleSize::Pm2_5, channel), pm25);
            r.set(Field::atm(ParticleSize::Pm10_0, channel), pm10);
        }
        r
    }

    fn same_rows(a: &[RawRecord], b: &[RawRecord]) -> bool {
        a.len() == b.len()
            && a.iter().zip(b).all(|(x, y)| {
                x.timestamp == y.timestamp
                    && x.values
                        .iter()
                        .zip(y.values.iter())
                        .all(|(p, q)| p == q || (p.is_nan() && q.is_nan()))
            })
    }

    #[test]
    fn test_consistent_row_passes_all_rules() {
        let r = record((1.0, 2.0, 3.0), (1.0, 2.0, 3.0));
        assert!(!cf_below_atm(&r));
        assert!(!particle_order_violated(&r));
        assert!(!has_negative_cf(&r));
        assert_eq!(clean(&[r.clone()]), vec![r]);
    }

    #[test]
    fn test_cf_below_atm_blanks_whole_row() {
        let mut r = record((1.0, 2.0, 3.0), (1.0, 2.0, 3.0));
        r.set(Field::atm(ParticleSize::Pm10_0, Channel::B), 3.5);

        let out = filter_cf_below_atm(&[r]);
        assert_eq!(out[0].values.iter().filter(|v| v.is_nan()).count(), FIELD_COUNT);
    }

    #[test]
    fn test_each_ordering_violation() {
        let cases = [
            record((3.0, 2.0, 5.0), (1.0, 2.0, 3.0)), // pm1 > pm2.5
            record((1.0, 2.0, 3.0), (4.0, 5.0, 3.5)), // pm1 > pm10 (and pm2.5 > pm10)
            record((1.0, 4.0, 3.0), (1.0, 2.0, 3.0)), // pm2.5 > pm10
        ];
        for r in cases {
            assert!(particle_order_violated(&r));
            assert!(filter_particle_order(&[r])[0].is_blank());
        }
    }

    #[test]
    fn test_pm1_above_pm10_only() {
        // pm1 > pm10 while pm2.5 is missing, so only that pairwise rule can fire
        let mut r = record((1.0, 2.0, 3.0), (1.0, 2.0, 3.0));
        r.set(Field::cf(ParticleSize::Pm2_5, Channel::A), f64::NAN);
        r.set(Field::cf(ParticleSize::Pm1_0, Channel::A), 5.0);
        r.set(Field::atm(ParticleSize::Pm1_0, Channel::A), 0.0);

        assert!(particle_order_violated(&r));
    }

    #[test]
    fn test_negative_cf_blanks_row() {
        let mut r = record((1.0, 2.0, 3.0), (1.0, 2.0, 3.0));
        r.set(Field::cf(ParticleSize::Pm1_0, Channel::B), -0.5);
        r.set(Field::atm(ParticleSize::Pm1_0, Channel::B), -1.0);

        assert!(!cf_below_atm(&r));
        assert!(!particle_order_violated(&r));
        assert!(filter_negative(&[r])[0].is_blank());
    }

    #[test]
    fn test_nan_never_trips_a_rule() {
        let r = RawRecord::nan(Default::default());
        assert!(!cf_below_atm(&r));
        assert!(!particle_order_violated(&r));
        assert!(!has_negative_cf(&r));
    }

    #[test]
    fn test_clean_counts_first_matching_stage() {
        let mut below_atm = record((1.0, 2.0, 3.0), (1.0, 2.0, 3.0));
        below_atm.set(Field::atm(ParticleSize::Pm2_5, Channel::A), 2.5);
        let disordered = record((1.0, 2.0, 3.0), (2.5, 2.0, 3.0));
        let mut negative = record((1.0, 2.0, 3.0), (1.0, 2.0, 3.0));
        negative.set(Field::cf(ParticleSize::Pm10_0, Channel::A), -3.0);
        negative.set(Field::atm(ParticleSize::Pm10_0, Channel::A), -3.0);
        negative.set(Field::cf(ParticleSize::Pm1_0, Channel::A), -5.0);
        negative.set(Field::atm(ParticleSize::Pm1_0, Channel::A), -5.0);
        negative.set(Field::cf(ParticleSize::Pm2_5, Channel::A), -4.0);
        negative.set(Field::atm(ParticleSize::Pm2_5, Channel::A), -4.0);
        let good = record((1.0, 2.0, 3.0), (1.0, 2.0, 3.0));

        let mut rows = vec![below_atm, disordered, negative, good.clone()];
        let counts = clean_in_place(&mut rows);

        assert_eq!(counts.cf_below_atm, 1);
        assert_eq!(counts.particle_order, 1);
        assert_eq!(counts.negative, 1);
        assert_eq!(counts.particle_order_second_pass, 0);
        assert_eq!(counts.total(), 3);
        assert!(rows[..3].iter().all(|r| r.is_blank()));
        assert_eq!(rows[3], good);
    }

    #[test]
    fn test_cleaned_rows_are_a_fixed_point() {
        let rows = vec![
            record((1.0, 2.0, 3.0), (1.0, 2.0, 3.0)),
            record((-1.0, 2.0, 1.5), (1.0, 2.0, 3.0)),
            record((1.0, 0.5, 3.0), (1.0, 2.0, 3.0)),
        ];
        let cleaned = clean(&rows);

        assert!(cleaned[1].is_blank());
        assert!(cleaned[2].is_blank());
        assert!(same_rows(&filter_particle_order(&cleaned), &cleaned));
        assert!(same_rows(&filter_negative(&cleaned), &cleaned));
    }
}
