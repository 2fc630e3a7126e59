//! The normalized, read-only thread state table and the typed operations
//! the reports are built from.
//!
//! A [`StateTable`] is built once per session, either from raw engine rows
//! ([`StateTable::from_raw`]) or from a previous CSV export
//! ([`StateTable::load_csv`]), and is only ever borrowed afterwards.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::stats::{round2, Describe};
use crate::trace::constants::{NS_PER_MS, NS_PER_SEC};
use crate::trace::{RawStateRow, StateInterval};

/// Normalized thread state intervals, in engine order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateTable {
    rows: Vec<StateInterval>,
}

impl StateTable {
    /// Normalize raw engine rows.
    ///
    /// Timestamps are rebased on the earliest one and converted to seconds,
    /// durations are converted to milliseconds. Negative durations (open
    /// intervals) are clamped to zero.
    pub fn from_raw(raw: Vec<RawStateRow>) -> Self {
        let Some(base) = raw.iter().map(|r| r.ts).min() else {
            debug!("No thread state rows to normalize");
            return Self::default();
        };

        let rows: Vec<StateInterval> = raw
            .into_iter()
            .map(|r| StateInterval {
                ts: (r.ts - base) as f64 / NS_PER_SEC,
                cpu: r.cpu,
                state: r.state,
                dur: r.dur.max(0) as f64 / NS_PER_MS,
                tid: r.tid,
                name: r.name,
            })
            .collect();

        info!("Normalized {} thread state intervals", rows.len());
        Self { rows }
    }

    /// Wrap intervals that are already normalized.
    pub fn from_intervals(rows: Vec<StateInterval>) -> Self {
        Self { rows }
    }

    /// Reload a table written by [`crate::export::states_save_csv`].
    ///
    /// The file already holds normalized values so no conversion is applied.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: StateInterval =
                record.with_context(|| format!("Malformed row in {}", path.display()))?;
            rows.push(row);
        }

        info!("Loaded {} intervals from {}", rows.len(), path.display());
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[StateInterval] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// -- Table operations --

/// Rows whose state is one of `states`.
pub fn filter_states<'a>(rows: &[&'a StateInterval], states: &[&str]) -> Vec<&'a StateInterval> {
    rows.iter()
        .copied()
        .filter(|r| states.contains(&r.state.as_str()))
        .collect()
}

/// Rows whose thread name contains `pattern`.
pub fn filter_name_contains<'a>(
    rows: &[&'a StateInterval],
    pattern: &str,
) -> Vec<&'a StateInterval> {
    rows.iter()
        .copied()
        .filter(|r| r.name_contains(pattern))
        .collect()
}

/// Rows whose thread name is exactly `name`.
pub fn filter_name<'a>(rows: &[&'a StateInterval], name: &str) -> Vec<&'a StateInterval> {
    rows.iter()
        .copied()
        .filter(|r| r.name.as_deref() == Some(name))
        .collect()
}

/// Rows that carry a thread name.
pub fn filter_named<'a>(rows: &[&'a StateInterval]) -> Vec<&'a StateInterval> {
    rows.iter().copied().filter(|r| r.name.is_some()).collect()
}

/// Rows belonging to thread `tid`.
pub fn filter_tid<'a>(rows: &[&'a StateInterval], tid: i64) -> Vec<&'a StateInterval> {
    rows.iter().copied().filter(|r| r.tid == tid).collect()
}

/// Distinct keys in the order they are first encountered.
pub fn distinct<K, F>(rows: &[&StateInterval], key: F) -> Vec<K>
where
    K: Eq + Hash + Clone,
    F: Fn(&StateInterval) -> K,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for r in rows {
        let k = key(r);
        if seen.insert(k.clone()) {
            out.push(k);
        }
    }
    out
}

/// Distinct keys in ascending order.
pub fn sorted_distinct<K, F>(rows: &[&StateInterval], key: F) -> Vec<K>
where
    K: Ord,
    F: Fn(&StateInterval) -> K,
{
    let mut keys: Vec<K> = rows.iter().map(|r| key(r)).collect();
    keys.sort();
    keys.dedup();
    keys
}

/// Durations grouped by `key`, groups in ascending key order.
pub fn group_durations<K, F>(rows: &[&StateInterval], key: F) -> BTreeMap<K, Vec<f64>>
where
    K: Ord,
    F: Fn(&StateInterval) -> K,
{
    let mut groups: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    for r in rows {
        groups.entry(key(r)).or_default().push(r.dur);
    }
    groups
}

/// Rounded descriptive statistics per group.
pub fn describe_groups<K: Ord + Clone>(groups: &BTreeMap<K, Vec<f64>>) -> Vec<(K, Describe)> {
    groups
        .iter()
        .filter_map(|(k, durs)| Describe::from_samples(durs).map(|d| (k.clone(), d.rounded())))
        .collect()
}

/// Total duration of `rows`, rounded to two decimals.
pub fn sum_dur(rows: &[&StateInterval]) -> f64 {
    round2(rows.iter().map(|r| r.dur).sum())
}
