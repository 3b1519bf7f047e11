//! Shared sample containers for the consolidation pipeline

use crate::{errors::StackerError, Iq};

/// One raw acquisition: a short run of IQ samples at a constant nominal rate.
///
/// The recorded timestamp belongs to the first sample; every later sample is
/// placed on the linear grid `start_timestamp + i / sample_rate`. No
/// intra-unit clock drift is modeled.
#[derive(Debug, Clone)]
pub struct CaptureUnit {
    pub start_timestamp: f64,
    pub sample_rate: f64,
    pub samples: Vec<Iq>,
}

impl CaptureUnit {
    /// Absolute timestamp of sample `i`
    pub fn sample_timestamp(&self, i: usize) -> f64 {
        self.start_timestamp + i as f64 * (1.0 / self.sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Timestamped IQ samples, positionally paired.
///
/// Neither sorted nor duplicate-free in general; archives fresh from a merge
/// keep their stored order, so consumers sort before use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    pub timestamps: Vec<f64>,
    pub iq: Vec<Iq>,
}

impl SampleSet {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(n),
            iq: Vec::with_capacity(n),
        }
    }

    pub fn from_parts(timestamps: Vec<f64>, iq: Vec<Iq>) -> Result<Self, StackerError> {
        if timestamps.len() != iq.len() {
            return Err(StackerError::LengthMismatch {
                timestamps: timestamps.len(),
                iq: iq.len(),
            });
        }
        Ok(Self { timestamps, iq })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, timestamp: f64, value: Iq) {
        self.timestamps.push(timestamp);
        self.iq.push(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, Iq)> + '_ {
        self.timestamps.iter().copied().zip(self.iq.iter().copied())
    }

    /// Earliest and latest timestamp; a full scan, since sets are unsorted
    pub fn time_span(&self) -> Option<(f64, f64)> {
        let mut iter = self.timestamps.iter().copied();
        let first = iter.next()?;
        let (mut min, mut max) = (first, first);
        for t in iter {
            min = min.min(t);
            max = max.max(t);
        }
        Some((min, max))
    }

    /// Copy of this set ordered by ascending timestamp (stable on ties)
    pub fn sorted(&self) -> SampleSet {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.timestamps[a].total_cmp(&self.timestamps[b]));
        let mut out = SampleSet::with_capacity(self.len());
        for i in order {
            out.push(self.timestamps[i], self.iq[i]);
        }
        out
    }
}
