//! Gap-filling resampler onto the nominal hourly grid

use crate::errors::StackerError;
use crate::hour::hour_floor;
use crate::samples::SampleSet;
use crate::{Iq, SECONDS_PER_HOUR};

/// Resample one (possibly ragged) hour of data onto the fixed-rate grid.
///
/// The grid starts at the top of the hour containing the earliest input
/// sample and holds exactly `3600 * rate` instants spaced `1 / rate` apart.
/// Instants inside the convex hull of the input timestamps are linearly
/// interpolated between the bracketing real samples; instants outside it
/// are exactly zero. No capture means silence, not extrapolation.
///
/// Input spanning more than one hour signals an upstream merge defect and is
/// rejected rather than truncated.
pub fn fill_gaps(input: &SampleSet, rate: f64) -> Result<SampleSet, StackerError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(StackerError::InvalidSampleRate(rate));
    }
    if input.is_empty() {
        return Err(StackerError::EmptySampleSet);
    }

    let sorted = input.sorted();
    let ts = &sorted.timestamps;
    let m = ts.len();
    let (t_min, t_max) = (ts[0], ts[m - 1]);
    if !t_min.is_finite() || !t_max.is_finite() {
        return Err(StackerError::InvalidTimestamp(if t_min.is_finite() {
            t_max
        } else {
            t_min
        }));
    }
    let span = t_max - t_min;
    if span > SECONDS_PER_HOUR {
        return Err(StackerError::SpanExceedsHour { span_seconds: span });
    }

    let start = hour_floor(t_min);
    let delta = 1.0 / rate;
    let points = (SECONDS_PER_HOUR * rate).round() as usize;

    let mut out = SampleSet::with_capacity(points);
    // Bracket index: ts[k] <= g <= ts[k+1] once g enters the hull. Grid
    // instants are visited in ascending order, so k only ever advances.
    let mut k = 0usize;
    for i in 0..points {
        let g = start + i as f64 * delta;
        let v = if g < t_min || g > t_max {
            Iq::new(0.0, 0.0)
        } else {
            while k + 1 < m && ts[k + 1] < g {
                k += 1;
            }
            if k + 1 == m || g <= ts[k] {
                // Exact hit (or a single-sample hull)
                sorted.iq[k]
            } else if g >= ts[k + 1] {
                sorted.iq[k + 1]
            } else {
                let (t0, t1) = (ts[k], ts[k + 1]);
                let (v0, v1) = (sorted.iq[k], sorted.iq[k + 1]);
                let frac = (g - t0) / (t1 - t0);
                v0 + (v1 - v0) * frac
            }
        };
        out.push(g, v);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-04 11:00:00 UTC
    const HOUR_11: f64 = 1_704_366_000.0;
    const ZERO: Iq = Iq::new(0.0, 0.0);

    fn set(pairs: &[(f64, Iq)]) -> SampleSet {
        SampleSet {
            timestamps: pairs.iter().map(|p| p.0).collect(),
            iq: pairs.iter().map(|p| p.1).collect(),
        }
    }

    #[test]
    fn output_covers_the_hour_at_uniform_spacing() {
        let input = set(&[
            (HOUR_11 + 100.0, Iq::new(1.0, 0.0)),
            (HOUR_11 + 200.0, Iq::new(2.0, 0.0)),
        ]);
        let out = fill_gaps(&input, 4.0).unwrap();
        assert_eq!(out.len(), 14_400);
        for (i, &t) in out.timestamps.iter().enumerate() {
            // 0.25 s steps from a whole-second start stay exact in f64
            assert_eq!(t, HOUR_11 + i as f64 * 0.25);
        }
    }

    #[test]
    fn nominal_rate_yields_the_full_grid() {
        let input = set(&[(HOUR_11 + 1.0, Iq::new(1.0, 1.0))]);
        let out = fill_gaps(&input, crate::NOMINAL_RATE_HZ).unwrap();
        assert_eq!(out.len(), 360_000);
    }

    #[test]
    fn instants_outside_the_hull_are_exactly_zero() {
        let input = set(&[
            (HOUR_11 + 100.0, Iq::new(1.0, 2.0)),
            (HOUR_11 + 200.0, Iq::new(3.0, 4.0)),
        ]);
        let out = fill_gaps(&input, 4.0).unwrap();
        assert_eq!(out.iq[0], ZERO);
        assert_eq!(out.iq[100 * 4 - 1], ZERO);
        assert_eq!(out.iq[200 * 4 + 1], ZERO);
        assert_eq!(out.iq[14_399], ZERO);
    }

    #[test]
    fn interior_instants_interpolate_linearly() {
        let input = set(&[
            (HOUR_11 + 10.0, Iq::new(1.0, 1.0)),
            (HOUR_11 + 10.5, Iq::new(3.0, -1.0)),
        ]);
        let out = fill_gaps(&input, 4.0).unwrap();
        // Grid instant 10.25 s sits halfway between the two real samples.
        let v = out.iq[41];
        assert!((v.re - 2.0).abs() < 1e-9);
        assert!(v.im.abs() < 1e-9);
    }

    #[test]
    fn grid_instants_on_real_samples_take_the_real_value() {
        let v0 = Iq::new(7.0, -3.0);
        let input = set(&[(HOUR_11 + 10.0, v0), (HOUR_11 + 11.0, Iq::new(1.0, 1.0))]);
        let out = fill_gaps(&input, 4.0).unwrap();
        assert_eq!(out.iq[40], v0);
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let input = set(&[
            (HOUR_11 + 20.0, Iq::new(2.0, 0.0)),
            (HOUR_11 + 10.0, Iq::new(1.0, 0.0)),
        ]);
        let out = fill_gaps(&input, 1.0).unwrap();
        assert_eq!(out.iq[10], Iq::new(1.0, 0.0));
        assert_eq!(out.iq[15], Iq::new(1.5, 0.0));
        assert_eq!(out.iq[20], Iq::new(2.0, 0.0));
    }

    #[test]
    fn span_over_one_hour_is_rejected() {
        let input = set(&[(HOUR_11, ZERO), (HOUR_11 + 3600.5, ZERO)]);
        assert!(matches!(
            fill_gaps(&input, 4.0),
            Err(StackerError::SpanExceedsHour { .. })
        ));
        // Exactly one hour is still legal.
        let input = set(&[(HOUR_11, ZERO), (HOUR_11 + 3600.0, ZERO)]);
        assert!(fill_gaps(&input, 4.0).is_ok());
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(matches!(
            fill_gaps(&SampleSet::default(), 4.0),
            Err(StackerError::EmptySampleSet)
        ));
        let input = set(&[(HOUR_11, ZERO)]);
        assert!(matches!(
            fill_gaps(&input, 0.0),
            Err(StackerError::InvalidSampleRate(_))
        ));
        let input = set(&[(f64::NAN, ZERO)]);
        assert!(matches!(
            fill_gaps(&input, 4.0),
            Err(StackerError::InvalidTimestamp(_))
        ));
    }
}
