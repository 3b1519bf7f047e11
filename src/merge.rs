//! Idempotent merging of sample sets into hourly archives

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::errors::StackerError;
use crate::hour::HourKey;
use crate::samples::SampleSet;
use crate::store::ArchiveStore;

/// Result of a pure merge of two sample sets
pub enum Merge {
    /// Every incoming timestamp already exists in the archive
    Unchanged,
    /// The dedup union, ready to replace the archive contents
    Updated { set: SampleSet, added: usize },
}

/// What a persisted merge did, for batch accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Unchanged,
    Merged { added: usize, total: usize },
}

/// Dedup union of `existing` and `incoming`.
///
/// Equality is exact on the stored f64 timestamp; `to_bits` stands in for
/// `==` since epoch timestamps are never NaN or signed zero. On a timestamp
/// collision the archived pair wins and the incoming one is dropped.
pub fn merge_sets(existing: &SampleSet, incoming: &SampleSet) -> Merge {
    let mut seen: HashSet<u64> = existing.timestamps.iter().map(|t| t.to_bits()).collect();
    if incoming
        .timestamps
        .iter()
        .all(|t| seen.contains(&t.to_bits()))
    {
        return Merge::Unchanged;
    }

    let mut merged = existing.clone();
    let mut added = 0usize;
    for (t, v) in incoming.iter() {
        if seen.insert(t.to_bits()) {
            merged.push(t, v);
            added += 1;
        }
    }
    Merge::Updated { set: merged, added }
}

/// Read-merge-write for one hour key.
///
/// Callers must hold the key's lock (see [`KeyLocks`]): two unsynchronized
/// merges to the same key can silently drop one side's data.
pub fn merge_into_store(
    store: &ArchiveStore,
    key: HourKey,
    incoming: &SampleSet,
    dry_run: bool,
) -> Result<MergeOutcome, StackerError> {
    let existing = store.load(&key)?.unwrap_or_default();
    match merge_sets(&existing, incoming) {
        Merge::Unchanged => {
            debug!("{}: data exists, nothing merged", key);
            Ok(MergeOutcome::Unchanged)
        }
        Merge::Updated { set, added } => {
            let total = set.len();
            if dry_run {
                info!(
                    "{}: would write {} samples ({} new) to {}",
                    key,
                    total,
                    added,
                    store.path_for(&key).display()
                );
            } else {
                store.save(&key, &set)?;
                debug!("{}: merged {} new samples, {} total", key, added, total);
            }
            Ok(MergeOutcome::Merged { added, total })
        }
    }
}

/// Registry of per-hour-key mutexes.
///
/// Distinct hour keys share no state and may merge fully in parallel; the
/// read-merge-write sequence for a single key is a critical section.
#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<HourKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn acquire(&self, key: HourKey) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().expect("lock registry poisoned");
        Arc::clone(map.entry(key).or_default())
    }
}
