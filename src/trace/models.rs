//! Thread state records before and after normalization.

use serde::{Deserialize, Serialize};

/// One thread state interval exactly as the query engine returns it.
///
/// # Fields
/// - `ts`: Start timestamp in nanoseconds (trace clock)
/// - `cpu`: CPU the thread ran on; absent for off-CPU states
/// - `state`: State code (e.g. "Running", "R", "R+", "D", "S")
/// - `dur`: Duration in nanoseconds
/// - `tid`: OS thread ID
/// - `name`: Thread name, absent when the thread metadata has none
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawStateRow {
    pub ts: i64,
    pub cpu: Option<i32>,
    pub state: String,
    pub dur: i64,
    pub tid: i64,
    pub name: Option<String>,
}

/// A normalized thread state interval.
///
/// `ts` is in seconds relative to the earliest interval of the trace and
/// `dur` is in milliseconds. Field order matches the CSV column order.
///
/// Note: Cannot derive `Eq` because `ts` and `dur` are `f64`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateInterval {
    pub ts: f64,
    pub cpu: Option<i32>,
    pub state: String,
    pub dur: f64,
    pub tid: i64,
    pub name: Option<String>,
}

impl StateInterval {
    /// Case-sensitive substring match on the thread name. Absent names never match.
    pub fn name_contains(&self, pattern: &str) -> bool {
        self.name.as_deref().is_some_and(|n| n.contains(pattern))
    }
}
