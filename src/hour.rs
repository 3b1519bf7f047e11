//! Hour-key arithmetic on absolute sample timestamps

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::{errors::StackerError, ARCHIVE_PREFIX, SECONDS_PER_HOUR};

/// UTC calendar hour used to bucket samples and name archives.
///
/// Internally this is the number of whole hours since the Unix epoch, which
/// makes the key cheap to compare and hash; the calendar fields are derived
/// on demand for file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HourKey {
    index: i64,
}

/// Whole hours since the Unix epoch containing `t`
pub fn hour_index(t: f64) -> i64 {
    (t / SECONDS_PER_HOUR).floor() as i64
}

/// `t` truncated down to the top of its hour
pub fn hour_floor(t: f64) -> f64 {
    (t / SECONDS_PER_HOUR).floor() * SECONDS_PER_HOUR
}

impl HourKey {
    pub fn from_timestamp(t: f64) -> Result<Self, StackerError> {
        if !t.is_finite() {
            return Err(StackerError::InvalidTimestamp(t));
        }
        let index = hour_index(t);
        let secs = index
            .checked_mul(3600)
            .ok_or(StackerError::InvalidTimestamp(t))?;
        if DateTime::<Utc>::from_timestamp(secs, 0).is_none() {
            return Err(StackerError::InvalidTimestamp(t));
        }
        Ok(Self { index })
    }

    /// Epoch seconds at the top of this hour
    pub fn start_timestamp(&self) -> f64 {
        (self.index * 3600) as f64
    }

    pub fn next(&self) -> Self {
        Self {
            index: self.index + 1,
        }
    }

    fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.index * 3600, 0).expect("validated at construction")
    }

    pub fn year(&self) -> i32 {
        self.datetime().year()
    }

    pub fn month(&self) -> u32 {
        self.datetime().month()
    }

    pub fn day(&self) -> u32 {
        self.datetime().day()
    }

    pub fn hour(&self) -> u32 {
        self.datetime().hour()
    }

    /// Archive file name for this hour, e.g. `doppler_lyr_20240104_11UT.npz`
    pub fn file_name(&self) -> String {
        let dt = self.datetime();
        format!(
            "{}_{:04}{:02}{:02}_{:02}UT.npz",
            ARCHIVE_PREFIX,
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour()
        )
    }

    /// Archive location relative to the output root: `YYYY/MM/DD/<file_name>`
    pub fn relative_path(&self) -> PathBuf {
        let dt = self.datetime();
        PathBuf::from(format!(
            "{:04}/{:02}/{:02}",
            dt.year(),
            dt.month(),
            dt.day()
        ))
        .join(self.file_name())
    }
}

impl fmt::Display for HourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dt = self.datetime();
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}UT",
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour()
        )
    }
}
