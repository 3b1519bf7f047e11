//! Batch drivers: consolidate a directory of captures, gap-fill archives.
//!
//! Per-item failures are logged and counted, never fatal to the run; merge
//! is idempotent, so the recovery path for a failed batch is to re-run it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{bounded, unbounded};
use tracing::{debug, info, warn};

use crate::errors::StackerError;
use crate::merge::{merge_into_store, KeyLocks, MergeOutcome};
use crate::resample::fill_gaps;
use crate::split::split_by_hour;
use crate::store::{self, ArchiveStore};
use crate::NOGAPS_SUFFIX;

/// Settings for one consolidation run, supplied by the CLI
#[derive(Debug, Clone)]
pub struct CombineConfig {
    pub input_dir: PathBuf,
    pub output_root: PathBuf,
    pub delete_inputs: bool,
    pub dry_run: bool,
    pub workers: usize,
}

/// Settings for one gap-fill run
#[derive(Debug, Clone)]
pub struct FillConfig {
    pub rate: f64,
    pub dry_run: bool,
}

/// Aggregated per-item results of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Items picked up (capture files or archives)
    pub processed: usize,
    /// Hour merges that replaced an archive
    pub merged: usize,
    /// Hour merges that found nothing new
    pub unchanged: usize,
    /// Gap-filled outputs written (or planned, under dry-run)
    pub written: usize,
    pub failures: Vec<(PathBuf, StackerError)>,
}

impl BatchReport {
    pub fn had_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn record_failure(&mut self, path: PathBuf, err: StackerError) {
        warn!("{}: {}", path.display(), err);
        self.failures.push((path, err));
    }
}

struct FileOutcome {
    merged: usize,
    unchanged: usize,
}

/// Consolidate every raw capture file in the input directory into hourly
/// archives under the output root.
///
/// Files fan out to worker threads; merges for the same hour key serialize
/// on a per-key lock while distinct keys proceed in parallel. The stop flag
/// halts submission of new files; in-flight files run to completion.
pub fn combine_directory(
    cfg: &CombineConfig,
    stop: &AtomicBool,
) -> Result<BatchReport, StackerError> {
    let files = npz_files_in(&cfg.input_dir)?;
    info!(
        "consolidating {} capture files from {}",
        files.len(),
        cfg.input_dir.display()
    );

    let archive_store = ArchiveStore::new(&cfg.output_root);
    let locks = KeyLocks::default();
    let workers = cfg.workers.max(1);

    let (work_tx, work_rx) = bounded::<PathBuf>(workers);
    let (done_tx, done_rx) = unbounded::<(PathBuf, Result<FileOutcome, StackerError>)>();

    thread::scope(|s| {
        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            let archive_store = &archive_store;
            let locks = &locks;
            s.spawn(move || {
                for path in work_rx {
                    let res = consolidate_file(archive_store, locks, &path, cfg);
                    if done_tx.send((path, res)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(work_rx);
        drop(done_tx);

        for path in files {
            if stop.load(Ordering::Relaxed) {
                warn!("stop requested, submitting no further capture files");
                break;
            }
            if work_tx.send(path).is_err() {
                break;
            }
        }
        drop(work_tx);
    });

    let mut report = BatchReport::default();
    for (path, res) in done_rx.try_iter() {
        report.processed += 1;
        match res {
            Ok(outcome) => {
                report.merged += outcome.merged;
                report.unchanged += outcome.unchanged;
            }
            Err(err) => report.record_failure(path, err),
        }
    }
    Ok(report)
}

/// Split one capture file and merge each part into its hourly archive.
/// Consumed inputs are deleted only after every merge succeeded.
fn consolidate_file(
    archive_store: &ArchiveStore,
    locks: &KeyLocks,
    path: &Path,
    cfg: &CombineConfig,
) -> Result<FileOutcome, StackerError> {
    debug!("processing {}", path.display());
    let unit = store::read_capture(path)?;
    let parts = split_by_hour(unit)?;

    let mut outcome = FileOutcome {
        merged: 0,
        unchanged: 0,
    };
    for (key, set) in parts {
        let lock = locks.acquire(key);
        let _guard = lock.lock().expect("hour-key lock poisoned");
        match merge_into_store(archive_store, key, &set, cfg.dry_run)? {
            MergeOutcome::Unchanged => outcome.unchanged += 1,
            MergeOutcome::Merged { .. } => outcome.merged += 1,
        }
    }

    if cfg.delete_inputs && !cfg.dry_run {
        debug!("removing consumed input {}", path.display());
        fs::remove_file(path)?;
    }
    Ok(outcome)
}

/// Gap-fill the given archives (files, or directories walked recursively)
/// onto the nominal grid, writing a `-nogaps` sibling for each.
pub fn fill_paths(
    paths: &[PathBuf],
    cfg: &FillConfig,
    stop: &AtomicBool,
) -> Result<BatchReport, StackerError> {
    let mut targets = Vec::new();
    for path in paths {
        if path.is_dir() {
            collect_archives(path, &mut targets)?;
        } else {
            targets.push(path.clone());
        }
    }
    targets.sort();
    info!("gap-filling {} archives", targets.len());

    let mut report = BatchReport::default();
    for path in targets {
        if stop.load(Ordering::Relaxed) {
            warn!("stop requested, leaving remaining archives unfilled");
            break;
        }
        report.processed += 1;
        match fill_file(&path, cfg) {
            Ok(_) => report.written += 1,
            Err(err) => report.record_failure(path, err),
        }
    }
    Ok(report)
}

/// Resample one hourly archive and write the `-nogaps` output beside it
pub fn fill_file(path: &Path, cfg: &FillConfig) -> Result<PathBuf, StackerError> {
    let set = store::read_archive(path)?;
    let filled = fill_gaps(&set, cfg.rate)?;
    let out = nogaps_path(path);
    if cfg.dry_run {
        info!(
            "would write {} grid samples to {}",
            filled.len(),
            out.display()
        );
    } else {
        store::write_filled(&out, &filled)?;
        debug!("{} -> {}", path.display(), out.display());
    }
    Ok(out)
}

fn nogaps_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archive");
    path.with_file_name(format!("{}{}.npz", stem, NOGAPS_SUFFIX))
}

fn npz_files_in(dir: &Path) -> Result<Vec<PathBuf>, StackerError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |e| e == "npz") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn collect_archives(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StackerError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_archives(&path, out)?;
        } else if is_unfilled_archive(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_unfilled_archive(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == "npz")
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .map_or(false, |s| !s.ends_with(NOGAPS_SUFFIX))
}
