//! Consolidation of raw Doppler receiver captures into hourly archives.
//!
//! The acquisition side streams short IQ recordings to disk as npz files.
//! This crate stacks those recordings into one archive per UTC hour
//! (deduplicating overlap from re-run acquisitions) and can resample a
//! ragged hour onto the nominal fixed-rate grid, zero-filling capture gaps.

use num_complex::Complex;

pub mod args;
pub mod batch;
pub mod errors;
pub mod hour;
pub mod merge;
pub mod resample;
pub mod samples;
pub mod split;
pub mod store;

pub use errors::StackerError;
pub use hour::HourKey;
pub use samples::{CaptureUnit, SampleSet};

/// Nominal post-decimation sample rate of the receiver chain
pub const NOMINAL_RATE_HZ: f64 = 100.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;
/// Station prefix baked into every archive file name
pub const ARCHIVE_PREFIX: &str = "doppler_lyr";
/// Suffix appended to the file stem of gap-filled outputs
pub const NOGAPS_SUFFIX: &str = "-nogaps";

/// A single decimated receiver sample
pub type Iq = Complex<f64>;
