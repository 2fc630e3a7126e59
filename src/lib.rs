//! sched-states library - per-thread scheduling state reports.
//!
//! Thread state intervals (Running, Runnable, Uninterruptible Sleep, ...) are
//! loaded once from a trace database, normalized to relative seconds and
//! milliseconds, and summarized per thread, per CPU and per state.
//!
//! # Modules
//!
//! - [`source`] - `TraceSource` trait and the DuckDB loader
//! - [`table`] - the normalized `StateTable` and typed table operations
//! - [`stats`] - descriptive statistics (count/mean/std/min/percentiles/max)
//! - [`chart`] - `ChartRenderer` trait and the terminal stacked bar chart
//! - [`report`] - per-thread summaries and the whole-trace report
//! - [`export`] - CSV export
//!
//! # Example
//!
//! ```no_run
//! use sched_states::{load_states, sched_report, DuckDbSource, TerminalChart};
//! use std::path::Path;
//!
//! let mut source = DuckDbSource::open(Path::new("./trace.duckdb"), true)?;
//! let table = load_states(&mut source)?;
//! sched_report(&table, &mut TerminalChart::stdout(), &mut std::io::stdout())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod chart;
pub mod export;
pub mod report;
pub mod source;
pub mod stats;
pub mod table;
pub mod trace;

// Re-export for convenience
pub use chart::{ChartRenderer, TerminalChart};
pub use export::states_save_csv;
pub use report::{build_sched_report, sched_report, states_summary, thread_summaries};
pub use source::{load_states, DuckDbSource, TraceSource};
pub use table::StateTable;
pub use trace::{RawStateRow, StateInterval};
