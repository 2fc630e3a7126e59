//! DuckDB trace source.
//!
//! Two table layouts are understood:
//!
//! - **Thread state** (trace_processor exports): `thread_state` carries textual
//!   state codes and durations, and is joined with `thread` on `utid`.
//! - **Slices** (recorder databases): only `sched_slice` exists. Every slice is a
//!   `Running` interval and the gap until the next slice of the same thread is
//!   an off-CPU interval whose state comes from the slice's `end_state`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use duckdb::Connection;
use tracing::{debug, info, warn};

use super::TraceSource;
use crate::trace::RawStateRow;

/// Which tables the thread state rows are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaLayout {
    ThreadState,
    Slices,
}

impl SchemaLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreadState => "thread_state",
            Self::Slices => "sched_slice",
        }
    }
}

/// tid reported for intervals whose thread has no metadata row.
const MISSING_TID: i64 = -1;

/// [`TraceSource`] over a DuckDB trace database.
pub struct DuckDbSource {
    conn: Connection,
    path: PathBuf,
    trace_id: Option<String>,
}

impl DuckDbSource {
    /// Open a trace database.
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        if !path.exists() {
            bail!("Database not found: {}", path.display());
        }

        let conn = if read_only {
            let config = duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?;
            Connection::open_with_flags(path, config)?
        } else {
            Connection::open(path)?
        };

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            trace_id: None,
        })
    }

    /// Wrap an already open connection (e.g. an in-memory database).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            path: PathBuf::from(":memory:"),
            trace_id: None,
        }
    }

    /// Only load rows belonging to `trace_id`.
    pub fn with_trace_id(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Work out which table layout the database uses.
    pub fn detect_layout(&self) -> Result<SchemaLayout> {
        if !self.table_exists("thread")? {
            bail!(
                "Database {} missing thread table required for thread states.",
                self.path.display()
            );
        }

        if self.table_exists("thread_state")? {
            match self.column_type("thread_state", "state")?.as_deref() {
                Some("VARCHAR") => return Ok(SchemaLayout::ThreadState),
                Some(other) => debug!("thread_state.state has type {other}, not textual"),
                None => debug!("thread_state has no state column"),
            }
        }

        if self.table_exists("sched_slice")? {
            return Ok(SchemaLayout::Slices);
        }

        bail!(
            "Database {} has neither a textual thread_state table nor a sched_slice table.",
            self.path.display()
        );
    }

    // -- Internal helpers --

    fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = 'main' AND table_name = ?",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn column_type(&self, table: &str, column: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT data_type FROM information_schema.columns \
             WHERE table_schema = 'main' AND table_name = ? AND column_name = ?",
        )?;
        let mut rows = stmt.query([table, column])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Rows of `thread_state` the state query leaves out because their state is NULL.
    fn null_state_count(&self) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM thread_state st WHERE st.state IS NULL{}",
            trace_id_filter(self.trace_id.as_deref(), "st.")
        );
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    fn has_trace_id(&self, layout: SchemaLayout) -> Result<bool> {
        Ok(self.column_type(layout.as_str(), "trace_id")?.is_some()
            && self.column_type("thread", "trace_id")?.is_some())
    }
}

impl TraceSource for DuckDbSource {
    fn source_name(&self) -> &'static str {
        "duckdb"
    }

    fn thread_states(&mut self) -> Result<Vec<RawStateRow>> {
        let layout = self.detect_layout()?;
        let has_trace_id = self.has_trace_id(layout)?;
        if self.trace_id.is_some() && !has_trace_id {
            bail!(
                "Database {} has no trace_id column to filter on.",
                self.path.display()
            );
        }
        info!(
            "Reading thread states from {} ({} layout)",
            self.path.display(),
            layout.as_str()
        );

        let sql = match layout {
            SchemaLayout::ThreadState => {
                let skipped = self.null_state_count()?;
                if skipped > 0 {
                    warn!("Skipping {skipped} thread_state rows with no state");
                }
                build_thread_state_query(has_trace_id, self.trace_id.as_deref())
            }
            SchemaLayout::Slices => build_slice_state_query(has_trace_id, self.trace_id.as_deref()),
        };
        debug!("thread state query: {sql}");

        let mut stmt = self.conn.prepare(&sql).with_context(|| {
            format!(
                "Failed to prepare thread state query on {}",
                self.path.display()
            )
        })?;
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        let mut missing_threads = 0usize;
        while let Some(row) = rows.next()? {
            let tid: Option<i64> = row.get(4)?;
            if tid.is_none() {
                missing_threads += 1;
            }
            out.push(RawStateRow {
                ts: row.get(0)?,
                cpu: row.get(1)?,
                state: row.get(2)?,
                dur: row.get(3)?,
                tid: tid.unwrap_or(MISSING_TID),
                name: row.get(5)?,
            });
        }

        if missing_threads > 0 {
            warn!("{missing_threads} thread state rows have no matching thread metadata");
        }
        Ok(out)
    }
}

// -- Thread state query builders --

/// Build a trace_id SQL filter clause (e.g., ` AND st.trace_id = '...'`).
/// trace_id values are escaped via single-quote doubling for safe SQL interpolation.
fn trace_id_filter(trace_id: Option<&str>, table_alias: &str) -> String {
    match trace_id {
        Some(tid) => {
            let escaped = tid.replace('\'', "''");
            format!(" AND {table_alias}trace_id = '{escaped}'")
        }
        None => String::new(),
    }
}

/// Join condition between an interval alias and the thread table.
fn thread_join(alias: &str, has_trace_id: bool) -> String {
    if has_trace_id {
        format!("{alias}.utid = t.utid AND {alias}.trace_id = t.trace_id")
    } else {
        format!("{alias}.utid = t.utid")
    }
}

/// Thread state layout: the state table already holds every interval.
fn build_thread_state_query(has_trace_id: bool, trace_id: Option<&str>) -> String {
    let filter = trace_id_filter(trace_id, "st.");
    format!(
        "SELECT CAST(st.ts AS BIGINT) as ts, \
         CAST(st.cpu AS INTEGER) as cpu, \
         st.state, \
         CAST(st.dur AS BIGINT) as dur, \
         CAST(t.tid AS BIGINT) as tid, \
         t.name \
         FROM thread_state st \
         LEFT JOIN thread t ON {join} \
         WHERE st.state IS NOT NULL{filter} \
         ORDER BY st.ts",
        join = thread_join("st", has_trace_id),
    )
}

/// SQL expression mapping a slice's `end_state` to the state the thread is in
/// until its next slice. Bitwise checks catch compound states such as
/// TASK_UNINTERRUPTIBLE | TASK_NOLOAD (130).
const END_STATE_EXPR: &str = "CASE \
     WHEN sn.end_state IS NULL OR sn.end_state = 0 THEN 'R+' \
     WHEN sn.end_state & 2 != 0 THEN 'D' \
     WHEN sn.end_state & 1 != 0 THEN 'S' \
     WHEN sn.end_state & 4 != 0 THEN 'T' \
     WHEN sn.end_state & 8 != 0 THEN 't' \
     ELSE 'X' END";

/// Slice layout: synthesize Running and off-CPU intervals from `sched_slice`.
fn build_slice_state_query(has_trace_id: bool, trace_id: Option<&str>) -> String {
    let filter = trace_id_filter(trace_id, "");
    let trace_col = if has_trace_id { ", trace_id" } else { "" };
    let sn_trace_col = if has_trace_id { ", sn.trace_id" } else { "" };
    format!(
        "WITH sched_next AS (\
         SELECT *, LEAD(ts) OVER (PARTITION BY utid{partition} ORDER BY ts) as next_ts \
         FROM sched_slice \
         WHERE dur > 0{filter}), \
         intervals AS (\
         SELECT ts, CAST(cpu AS INTEGER) as cpu, 'Running' as state, dur, utid{trace_col} \
         FROM sched_next \
         UNION ALL \
         SELECT sn.ts + sn.dur as ts, CAST(NULL AS INTEGER) as cpu, \
         {end_state} as state, \
         sn.next_ts - (sn.ts + sn.dur) as dur, sn.utid{sn_trace_col} \
         FROM sched_next sn \
         WHERE sn.next_ts IS NOT NULL AND sn.next_ts > sn.ts + sn.dur) \
         SELECT CAST(i.ts AS BIGINT) as ts, i.cpu, i.state, \
         CAST(i.dur AS BIGINT) as dur, \
         CAST(t.tid AS BIGINT) as tid, t.name \
         FROM intervals i \
         LEFT JOIN thread t ON {join} \
         ORDER BY i.ts",
        partition = trace_col,
        end_state = END_STATE_EXPR,
        join = thread_join("i", has_trace_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_source(setup: &str) -> DuckDbSource {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(setup).unwrap();
        DuckDbSource::from_connection(conn)
    }

    const THREAD_STATE_DB: &str = "
        CREATE TABLE thread (utid BIGINT, tid INTEGER, name VARCHAR);
        CREATE TABLE thread_state (ts BIGINT, dur BIGINT, cpu INTEGER, state VARCHAR, utid BIGINT);
        INSERT INTO thread VALUES (1, 100, 'worker'), (2, 200, NULL);
        INSERT INTO thread_state VALUES
            (3000, 10, 0, 'Running', 1),
            (1000, 20, NULL, 'S', 1),
            (2000, 30, NULL, 'R', 2),
            (4000, 40, NULL, 'D', 3);
    ";

    #[test]
    fn test_build_thread_state_query_no_trace_id() {
        let sql = build_thread_state_query(false, None);
        assert!(sql.contains("FROM thread_state st"));
        assert!(sql.contains("LEFT JOIN thread t ON st.utid = t.utid"));
        assert!(!sql.contains("trace_id"));
    }

    #[test]
    fn test_build_thread_state_query_with_trace_id() {
        let sql = build_thread_state_query(true, Some("it's"));
        assert!(sql.contains("st.trace_id = t.trace_id"));
        assert!(sql.contains("st.trace_id = 'it''s'"));
    }

    #[test]
    fn test_build_slice_state_query_uses_lead() {
        let sql = build_slice_state_query(false, None);
        assert!(sql.contains("LEAD(ts) OVER (PARTITION BY utid ORDER BY ts)"));
        assert!(sql.contains("'Running' as state"));
        assert!(sql.contains("end_state & 2 != 0 THEN 'D'"));
        assert!(!sql.contains("trace_id"));
    }

    #[test]
    fn test_build_slice_state_query_partitions_by_trace() {
        let sql = build_slice_state_query(true, Some("t1"));
        assert!(sql.contains("PARTITION BY utid, trace_id"));
        assert!(sql.contains("AND trace_id = 't1'"));
        assert!(sql.contains("i.trace_id = t.trace_id"));
    }

    #[test]
    fn test_thread_state_layout_rows() {
        let mut source = memory_source(THREAD_STATE_DB);
        assert_eq!(source.detect_layout().unwrap(), SchemaLayout::ThreadState);

        let rows = source.thread_states().unwrap();
        assert_eq!(rows.len(), 4);

        // Ordered by timestamp
        let ts: Vec<i64> = rows.iter().map(|r| r.ts).collect();
        assert_eq!(ts, vec![1000, 2000, 3000, 4000]);

        assert_eq!(rows[0].state, "S");
        assert_eq!(rows[0].cpu, None);
        assert_eq!(rows[0].name.as_deref(), Some("worker"));
        assert_eq!(rows[1].tid, 200);
        assert_eq!(rows[1].name, None);
        assert_eq!(rows[2].cpu, Some(0));
        assert_eq!(rows[2].dur, 10);
        // utid 3 has no thread row
        assert_eq!(rows[3].tid, MISSING_TID);
    }

    #[test]
    fn test_null_states_are_counted_and_skipped() {
        let mut source = memory_source(
            "
            CREATE TABLE thread (utid BIGINT, tid INTEGER, name VARCHAR);
            CREATE TABLE thread_state (ts BIGINT, dur BIGINT, cpu INTEGER, state VARCHAR, utid BIGINT);
            INSERT INTO thread VALUES (1, 100, 'worker');
            INSERT INTO thread_state VALUES
                (0, 10, 0, 'Running', 1),
                (10, 5, NULL, NULL, 1),
                (15, 5, NULL, 'S', 1);
            ",
        );
        assert_eq!(source.null_state_count().unwrap(), 1);

        let rows = source.thread_states().unwrap();
        let states: Vec<&str> = rows.iter().map(|r| r.state.as_str()).collect();
        assert_eq!(states, vec!["Running", "S"]);
    }

    #[test]
    fn test_slice_layout_synthesizes_states() {
        let mut source = memory_source(
            "
            CREATE TABLE thread (utid BIGINT, tid INTEGER, name VARCHAR);
            CREATE TABLE sched_slice (ts BIGINT, dur BIGINT, cpu INTEGER, utid BIGINT, end_state INTEGER, priority INTEGER);
            INSERT INTO thread VALUES (1, 100, 'worker');
            INSERT INTO sched_slice VALUES
                (0, 100, 1, 1, 2, 120),
                (300, 100, 2, 1, NULL, 120),
                (450, 50, 1, 1, 1, 120);
            ",
        );
        assert_eq!(source.detect_layout().unwrap(), SchemaLayout::Slices);

        let rows = source.thread_states().unwrap();
        let got: Vec<(i64, &str, i64, Option<i32>)> = rows
            .iter()
            .map(|r| (r.ts, r.state.as_str(), r.dur, r.cpu))
            .collect();
        assert_eq!(
            got,
            vec![
                (0, "Running", 100, Some(1)),
                (100, "D", 200, None),
                (300, "Running", 100, Some(2)),
                (400, "R+", 50, None),
                (450, "Running", 50, Some(1)),
            ]
        );
        assert!(rows.iter().all(|r| r.tid == 100));
    }

    #[test]
    fn test_numeric_thread_state_falls_back_to_slices() {
        let source = memory_source(
            "
            CREATE TABLE thread (utid BIGINT, tid INTEGER, name VARCHAR);
            CREATE TABLE thread_state (ts BIGINT, dur BIGINT, utid BIGINT, state INTEGER, cpu INTEGER);
            CREATE TABLE sched_slice (ts BIGINT, dur BIGINT, cpu INTEGER, utid BIGINT, end_state INTEGER, priority INTEGER);
            ",
        );
        assert_eq!(source.detect_layout().unwrap(), SchemaLayout::Slices);
    }

    #[test]
    fn test_missing_tables_is_fatal() {
        let mut source = memory_source("CREATE TABLE process (upid BIGINT);");
        let err = source.thread_states().unwrap_err();
        assert!(err.to_string().contains("missing thread table"));

        let mut source =
            memory_source("CREATE TABLE thread (utid BIGINT, tid INTEGER, name VARCHAR);");
        let err = source.thread_states().unwrap_err();
        assert!(err.to_string().contains("neither"));
    }

    #[test]
    fn test_trace_id_filter_requires_column() {
        let mut source = memory_source(THREAD_STATE_DB).with_trace_id(Some("t1".to_string()));
        let err = source.thread_states().unwrap_err();
        assert!(err.to_string().contains("no trace_id column"));
    }

    #[test]
    fn test_trace_id_filter_selects_one_trace() {
        let mut source = memory_source(
            "
            CREATE TABLE thread (utid BIGINT, tid INTEGER, name VARCHAR, trace_id VARCHAR);
            CREATE TABLE thread_state (ts BIGINT, dur BIGINT, cpu INTEGER, state VARCHAR, utid BIGINT, trace_id VARCHAR);
            INSERT INTO thread VALUES (1, 100, 'a', 't1'), (1, 900, 'b', 't2');
            INSERT INTO thread_state VALUES (0, 5, 0, 'Running', 1, 't1'), (0, 7, 0, 'Running', 1, 't2');
            ",
        )
        .with_trace_id(Some("t2".to_string()));

        let rows = source.thread_states().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tid, 900);
        assert_eq!(rows[0].name.as_deref(), Some("b"));
        assert_eq!(rows[0].dur, 7);
    }

    #[test]
    fn test_open_missing_database() {
        let err = DuckDbSource::open(Path::new("/nonexistent/trace.duckdb"), true)
            .err()
            .unwrap();
        assert!(err.to_string().contains("Database not found"));
    }
}
