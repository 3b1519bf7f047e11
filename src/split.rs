//! Partitioning of capture units at UTC hour boundaries

use crate::errors::StackerError;
use crate::hour::{hour_index, HourKey};
use crate::samples::{CaptureUnit, SampleSet};

/// Place every sample of `unit` on its absolute timestamp and bucket the
/// unit by UTC hour.
///
/// The acquisition cadence writes short units, so a unit may touch at most
/// two calendar hours; anything longer is rejected rather than mis-split.
/// Nothing is duplicated or dropped: the two output sets concatenate back to
/// the input.
pub fn split_by_hour(unit: CaptureUnit) -> Result<Vec<(HourKey, SampleSet)>, StackerError> {
    if unit.is_empty() {
        return Err(StackerError::EmptySampleSet);
    }
    if !unit.sample_rate.is_finite() || unit.sample_rate <= 0.0 {
        return Err(StackerError::InvalidSampleRate(unit.sample_rate));
    }

    let first = unit.sample_timestamp(0);
    let last = unit.sample_timestamp(unit.len() - 1);
    let first_key = HourKey::from_timestamp(first)?;
    let last_key = HourKey::from_timestamp(last)?;
    let spanned = hour_index(last) - hour_index(first) + 1;
    if spanned > 2 {
        return Err(StackerError::UnitSpansTooManyHours { hours: spanned });
    }

    let timestamps: Vec<f64> = (0..unit.len()).map(|i| unit.sample_timestamp(i)).collect();

    if first_key == last_key {
        return Ok(vec![(
            first_key,
            SampleSet {
                timestamps,
                iq: unit.samples,
            },
        )]);
    }

    // Smallest index whose hour differs from the first sample's hour. The
    // rate is positive, so timestamps are increasing and j always exists.
    let boundary = hour_index(first);
    let j = timestamps
        .iter()
        .position(|&t| hour_index(t) != boundary)
        .expect("last sample is in a different hour");

    let mut head_ts = timestamps;
    let tail_ts = head_ts.split_off(j);
    let mut head_iq = unit.samples;
    let tail_iq = head_iq.split_off(j);

    Ok(vec![
        (
            first_key,
            SampleSet {
                timestamps: head_ts,
                iq: head_iq,
            },
        ),
        (
            last_key,
            SampleSet {
                timestamps: tail_ts,
                iq: tail_iq,
            },
        ),
    ])
}
