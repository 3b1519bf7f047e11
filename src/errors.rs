use std::path::PathBuf;

use ndarray_npy::{ReadNpzError, WriteNpzError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackerError {
    #[error("capture unit touches {hours} calendar hours, at most two are allowed")]
    UnitSpansTooManyHours { hours: i64 },

    #[error("sample set spans {span_seconds:.3} s, more than one hour")]
    SpanExceedsHour { span_seconds: f64 },

    #[error("sample set is empty")]
    EmptySampleSet,

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("timestamp {0} is not a representable UTC instant")]
    InvalidTimestamp(f64),

    #[error("{}: missing array '{name}'", .file.display())]
    MissingArray { file: PathBuf, name: &'static str },

    #[error("{}: array '{name}' has the wrong dtype or shape: {source}", .file.display())]
    BadArray {
        file: PathBuf,
        name: &'static str,
        source: ReadNpzError,
    },

    #[error("timestamps and iq arrays differ in length ({timestamps} vs {iq})")]
    LengthMismatch { timestamps: usize, iq: usize },

    #[error("unable to read npz file: {0}")]
    ReadNpz(#[from] ReadNpzError),

    #[error("unable to write npz file: {0}")]
    WriteNpz(#[from] WriteNpzError),

    #[error("file operation failed: {0}")]
    Io(#[from] std::io::Error),
}
