//! On-disk npz formats: raw capture files and hourly archives.
//!
//! Raw captures are written by the acquisition script as
//! `{timestamp: f64 scalar, fs: f64 scalar, samples: complex64}`; hourly
//! archives are `{timestamps: f64, iq: complex128}` of equal length,
//! compressed at rest. Both schemas are validated on load so a malformed
//! file fails with a reportable error instead of a lookup panic.

use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::{aview1, Array0, Array1};
use ndarray_npy::{NpzReader, NpzWriter, ReadableElement};
use num_complex::Complex;
use tempfile::NamedTempFile;

use crate::errors::StackerError;
use crate::hour::HourKey;
use crate::samples::{CaptureUnit, SampleSet};
use crate::Iq;

/// Hourly archives below a fixed output root, one file per hour key
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Deterministic archive location for an hour key
    pub fn path_for(&self, key: &HourKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    pub fn load(&self, key: &HourKey) -> Result<Option<SampleSet>, StackerError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        read_archive(&path).map(Some)
    }

    pub fn save(&self, key: &HourKey, set: &SampleSet) -> Result<(), StackerError> {
        write_npz(&self.path_for(key), set, true)
    }
}

/// Load an hourly archive, validating the `timestamps`/`iq` schema
pub fn read_archive(path: &Path) -> Result<SampleSet, StackerError> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let names = npz.names()?;
    let timestamps: Vec<f64> = read_vector(&mut npz, &names, path, "timestamps")?;
    let iq: Vec<Iq> = read_vector(&mut npz, &names, path, "iq")?;
    SampleSet::from_parts(timestamps, iq)
}

/// Load one raw capture file as written by the acquisition script
pub fn read_capture(path: &Path) -> Result<CaptureUnit, StackerError> {
    let mut npz = NpzReader::new(File::open(path)?)?;
    let names = npz.names()?;
    let start_timestamp = read_scalar(&mut npz, &names, path, "timestamp")?;
    let sample_rate = read_scalar(&mut npz, &names, path, "fs")?;
    // The receiver records single-precision IQ; widen on load.
    let raw: Vec<Complex<f32>> = read_vector(&mut npz, &names, path, "samples")?;
    let samples = raw
        .into_iter()
        .map(|v| Iq::new(v.re as f64, v.im as f64))
        .collect();
    Ok(CaptureUnit {
        start_timestamp,
        sample_rate,
        samples,
    })
}

/// Persist a consolidated hourly archive (compressed)
pub fn write_archive(path: &Path, set: &SampleSet) -> Result<(), StackerError> {
    write_npz(path, set, true)
}

/// Persist a gap-filled hour (uncompressed)
pub fn write_filled(path: &Path, set: &SampleSet) -> Result<(), StackerError> {
    write_npz(path, set, false)
}

fn write_npz(path: &Path, set: &SampleSet, compressed: bool) -> Result<(), StackerError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    // Races with other writers creating the same tree are benign here.
    fs::create_dir_all(parent)?;
    let tmp = NamedTempFile::new_in(parent)?;
    let mut npz = if compressed {
        NpzWriter::new_compressed(tmp)
    } else {
        NpzWriter::new(tmp)
    };
    npz.add_array("timestamps", &aview1(&set.timestamps))?;
    npz.add_array("iq", &aview1(&set.iq))?;
    let tmp = npz.finish()?;
    // Rename over the destination so readers never observe a partial file.
    tmp.persist(path).map_err(|e| StackerError::Io(e.error))?;
    Ok(())
}

fn entry_name(names: &[String], name: &str) -> Option<String> {
    let with_ext = format!("{}.npy", name);
    names
        .iter()
        .find(|n| **n == with_ext || **n == name)
        .cloned()
}

fn read_vector<T: ReadableElement + Clone>(
    npz: &mut NpzReader<File>,
    names: &[String],
    path: &Path,
    name: &'static str,
) -> Result<Vec<T>, StackerError> {
    let entry = entry_name(names, name).ok_or_else(|| StackerError::MissingArray {
        file: path.to_path_buf(),
        name,
    })?;
    let arr: Array1<T> = npz.by_name(&entry).map_err(|source| StackerError::BadArray {
        file: path.to_path_buf(),
        name,
        source,
    })?;
    Ok(arr.to_vec())
}

fn read_scalar(
    npz: &mut NpzReader<File>,
    names: &[String],
    path: &Path,
    name: &'static str,
) -> Result<f64, StackerError> {
    let entry = entry_name(names, name).ok_or_else(|| StackerError::MissingArray {
        file: path.to_path_buf(),
        name,
    })?;
    let arr: Array0<f64> = npz.by_name(&entry).map_err(|source| StackerError::BadArray {
        file: path.to_path_buf(),
        name,
        source,
    })?;
    Ok(arr.into_scalar())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpzKind {
    HourlyArchive,
    RawCapture,
}

/// What `inspect` reports about one npz file
#[derive(Debug, Clone)]
pub struct NpzSummary {
    pub kind: NpzKind,
    pub samples: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Describe an npz file, recognizing both archive and raw capture schemas
pub fn summarize(path: &Path) -> Result<NpzSummary, StackerError> {
    match read_archive(path) {
        Ok(set) => {
            let (min, max) = set.time_span().ok_or(StackerError::EmptySampleSet)?;
            Ok(NpzSummary {
                kind: NpzKind::HourlyArchive,
                samples: set.len(),
                start: utc_instant(min)?,
                end: utc_instant(max)?,
            })
        }
        Err(StackerError::MissingArray { .. }) => {
            let unit = read_capture(path)?;
            if unit.is_empty() {
                return Err(StackerError::EmptySampleSet);
            }
            Ok(NpzSummary {
                kind: NpzKind::RawCapture,
                samples: unit.len(),
                start: utc_instant(unit.start_timestamp)?,
                end: utc_instant(unit.sample_timestamp(unit.len() - 1))?,
            })
        }
        Err(e) => Err(e),
    }
}

fn utc_instant(t: f64) -> Result<DateTime<Utc>, StackerError> {
    if !t.is_finite() {
        return Err(StackerError::InvalidTimestamp(t));
    }
    let secs = t.floor() as i64;
    let nanos = ((t - t.floor()) * 1e9) as u32;
    DateTime::from_timestamp(secs, nanos.min(999_999_999)).ok_or(StackerError::InvalidTimestamp(t))
}

impl fmt::Display for NpzSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            NpzKind::HourlyArchive => "hourly archive",
            NpzKind::RawCapture => "raw capture",
        };
        writeln!(f, "{}, {} samples", kind, self.samples)?;
        writeln!(f, "\tfrom: {}", self.start.format("%Y-%m-%d %H:%M:%S%.6f UTC"))?;
        write!(f, "\tto:   {}", self.end.format("%Y-%m-%d %H:%M:%S%.6f UTC"))
    }
}

/// Test fixture writer for the acquisition side's raw capture format
#[cfg(test)]
pub(crate) fn write_capture(path: &Path, unit: &CaptureUnit) -> Result<(), StackerError> {
    let mut npz = NpzWriter::new(File::create(path)?);
    npz.add_array("timestamp", &ndarray::arr0(unit.start_timestamp))?;
    npz.add_array("fs", &ndarray::arr0(unit.sample_rate))?;
    let raw: Vec<Complex<f32>> = unit
        .samples
        .iter()
        .map(|v| Complex::new(v.re as f32, v.im as f32))
        .collect();
    npz.add_array("samples", &aview1(&raw))?;
    npz.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // 2024-01-04 11:00:00 UTC
    const HOUR_11: f64 = 1_704_366_000.0;

    fn sample_set() -> SampleSet {
        SampleSet {
            timestamps: vec![HOUR_11 + 1.0, HOUR_11 + 2.0, HOUR_11 + 3.0],
            iq: vec![
                Iq::new(1.0, -1.0),
                Iq::new(2.0, -2.0),
                Iq::new(3.0, -3.0),
            ],
        }
    }

    #[test]
    fn archive_round_trips_bit_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.npz");
        let set = sample_set();
        write_archive(&path, &set).unwrap();
        let back = read_archive(&path).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn store_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let store = ArchiveStore::new(dir.path().join("Doppler"));
        let key = HourKey::from_timestamp(HOUR_11).unwrap();
        let set = sample_set();

        assert!(store.load(&key).unwrap().is_none());
        store.save(&key, &set).unwrap();

        let expected = dir
            .path()
            .join("Doppler/2024/01/04/doppler_lyr_20240104_11UT.npz");
        assert_eq!(store.path_for(&key), expected);
        assert!(expected.is_file());
        assert_eq!(store.load(&key).unwrap().unwrap(), set);
    }

    #[test]
    fn overwrite_replaces_the_whole_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.npz");
        write_archive(&path, &sample_set()).unwrap();
        let replacement = SampleSet {
            timestamps: vec![HOUR_11 + 9.0],
            iq: vec![Iq::new(9.0, 9.0)],
        };
        write_archive(&path, &replacement).unwrap();
        assert_eq!(read_archive(&path).unwrap(), replacement);
    }

    #[test]
    fn missing_array_is_a_schema_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.npz");
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("timestamps", &aview1(&[1.0f64, 2.0])).unwrap();
        npz.finish().unwrap();

        let err = read_archive(&path).unwrap_err();
        assert!(matches!(err, StackerError::MissingArray { name: "iq", .. }));
    }

    #[test]
    fn wrong_dtype_is_a_schema_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.npz");
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("timestamps", &aview1(&[1.0f64, 2.0])).unwrap();
        // Real-valued where complex IQ is required
        npz.add_array("iq", &aview1(&[1.0f64, 2.0])).unwrap();
        npz.finish().unwrap();

        let err = read_archive(&path).unwrap_err();
        assert!(matches!(err, StackerError::BadArray { name: "iq", .. }));
    }

    #[test]
    fn mismatched_lengths_are_a_schema_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ragged.npz");
        let mut npz = NpzWriter::new(File::create(&path).unwrap());
        npz.add_array("timestamps", &aview1(&[1.0f64, 2.0])).unwrap();
        npz.add_array("iq", &aview1(&[Iq::new(0.0, 0.0)])).unwrap();
        npz.finish().unwrap();

        let err = read_archive(&path).unwrap_err();
        assert!(matches!(
            err,
            StackerError::LengthMismatch {
                timestamps: 2,
                iq: 1
            }
        ));
    }

    #[test]
    fn capture_round_trips_through_the_raw_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.npz");
        let unit = CaptureUnit {
            start_timestamp: HOUR_11 + 0.5,
            sample_rate: 100.0,
            // Values exact in f32 so the widening round trip stays exact
            samples: vec![Iq::new(0.5, -0.25), Iq::new(1.5, 2.0)],
        };
        write_capture(&path, &unit).unwrap();

        let back = read_capture(&path).unwrap();
        assert_eq!(back.start_timestamp, unit.start_timestamp);
        assert_eq!(back.sample_rate, unit.sample_rate);
        assert_eq!(back.samples, unit.samples);
    }

    #[test]
    fn summarize_recognizes_both_schemas() {
        let dir = tempdir().unwrap();

        let archive = dir.path().join("archive.npz");
        write_archive(&archive, &sample_set()).unwrap();
        let summary = summarize(&archive).unwrap();
        assert_eq!(summary.kind, NpzKind::HourlyArchive);
        assert_eq!(summary.samples, 3);

        let capture = dir.path().join("capture.npz");
        let unit = CaptureUnit {
            start_timestamp: HOUR_11,
            sample_rate: 10.0,
            samples: vec![Iq::new(1.0, 0.0); 5],
        };
        write_capture(&capture, &unit).unwrap();
        let summary = summarize(&capture).unwrap();
        assert_eq!(summary.kind, NpzKind::RawCapture);
        assert_eq!(summary.samples, 5);
        assert_eq!(summary.end.timestamp(), (HOUR_11 + 0.4) as i64);
    }
}
