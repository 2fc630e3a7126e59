//! Trace loading.
//!
//! This module defines the `TraceSource` trait that every query engine backend
//! implements. A source only has to produce the joined thread state rows; all
//! normalization happens in [`crate::table::StateTable::from_raw`].

mod duckdb_source;

pub use duckdb_source::{DuckDbSource, SchemaLayout};

use anyhow::Result;
use tracing::info;

use crate::table::StateTable;
use crate::trace::RawStateRow;

/// Trait for trace query engines.
pub trait TraceSource {
    /// Returns the engine name for log and error messages (e.g., "duckdb").
    fn source_name(&self) -> &'static str;

    /// Run the thread state / thread metadata join.
    ///
    /// Returns one row per interval with `ts` and `dur` in nanoseconds.
    /// Failures (missing relations, malformed trace) are fatal to the session.
    fn thread_states(&mut self) -> Result<Vec<RawStateRow>>;
}

/// Load and normalize the thread state table from `source`.
pub fn load_states(source: &mut dyn TraceSource) -> Result<StateTable> {
    let raw = source.thread_states()?;
    info!(
        "Loaded {} thread state rows from {}",
        raw.len(),
        source.source_name()
    );
    Ok(StateTable::from_raw(raw))
}
