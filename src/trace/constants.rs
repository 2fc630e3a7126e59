//! Shared constants for thread state reporting.

/// Thread state reported while a thread is on a CPU.
pub const STATE_RUNNING: &str = "Running";

/// Runnable states: woken (`R`) and preempted (`R+`).
pub const RUNNABLE_STATES: [&str; 2] = ["R", "R+"];

/// Running states.
pub const RUNNING_STATES: [&str; 1] = [STATE_RUNNING];

/// Uninterruptible sleep states.
pub const USLEEP_STATES: [&str; 1] = ["D"];

/// Interruptible sleep. Left out of per-thread bar charts.
pub const STATE_SLEEPING: &str = "S";

/// Number of groups kept in each ranking table.
pub const NR_TOP: usize = 100;

/// Percentiles printed alongside count/mean/std/min/max.
pub const PERCENTILES: [f64; 4] = [0.75, 0.90, 0.95, 0.99];

/// Width, in terminal columns, of every stacked bar chart.
pub const CHART_WIDTH: usize = 100;

/// Nanoseconds per second, used to rebase timestamps.
pub const NS_PER_SEC: f64 = 1e9;

/// Nanoseconds per millisecond, used to rescale durations.
pub const NS_PER_MS: f64 = 1e6;

/// Suffix appended to the user supplied prefix for CSV exports.
pub const CSV_SUFFIX: &str = "_sched_states.csv";
