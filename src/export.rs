//! CSV export of the normalized thread state table.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::table::StateTable;
use crate::trace::constants::CSV_SUFFIX;

/// Path of the CSV export for `prefix`.
pub fn csv_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}{CSV_SUFFIX}"))
}

/// Write every interval of `table` to `<prefix>_sched_states.csv`.
///
/// Columns are `ts,cpu,state,dur,tid,name` with the relative timestamp first;
/// absent CPUs and names are written as empty fields. Returns the written path.
pub fn states_save_csv(table: &StateTable, prefix: &str) -> Result<PathBuf> {
    let path = csv_path(prefix);
    write_csv(table, &path)?;
    Ok(path)
}

/// Write `table` as CSV to `path`.
pub fn write_csv(table: &StateTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    if table.is_empty() {
        writer.write_record(["ts", "cpu", "state", "dur", "tid", "name"])?;
    }
    for row in table.rows() {
        writer
            .serialize(row)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    info!("Wrote {} intervals to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::StateInterval;
    use tempfile::TempDir;

    fn interval(
        ts: f64,
        cpu: Option<i32>,
        state: &str,
        dur: f64,
        tid: i64,
        name: Option<&str>,
    ) -> StateInterval {
        StateInterval {
            ts,
            cpu,
            state: state.to_string(),
            dur,
            tid,
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_csv_path() {
        assert_eq!(csv_path("out/run1"), PathBuf::from("out/run1_sched_states.csv"));
    }

    #[test]
    fn test_csv_layout() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("trace");
        let table = StateTable::from_intervals(vec![
            interval(0.0, Some(2), "Running", 5.0, 10, Some("worker, main")),
            interval(1.5, None, "S", 0.25, 11, None),
        ]);

        let path = states_save_csv(&table, prefix.to_str().unwrap()).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ts,cpu,state,dur,tid,name");
        assert_eq!(lines[1], "0.0,2,Running,5.0,10,\"worker, main\"");
        assert_eq!(lines[2], "1.5,,S,0.25,11,");
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rt.csv");
        let table = StateTable::from_intervals(vec![
            interval(0.0, Some(0), "R+", 0.001234, 1, Some("a\"quoted\"")),
            interval(123.456789012, None, "D", 17.5, 2, None),
            interval(7.0, Some(31), "Running", 1e-6, 3, Some("kworker/3:1")),
        ]);

        write_csv(&table, &path).unwrap();
        let reloaded = StateTable::load_csv(&path).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_empty_table_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        write_csv(&StateTable::default(), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ts,cpu,state,dur,tid,name\n");
        assert!(StateTable::load_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn test_unwritable_path_fails() {
        let table = StateTable::from_intervals(vec![interval(0.0, None, "S", 1.0, 1, None)]);
        let err = states_save_csv(&table, "/nonexistent-dir/trace").unwrap_err();
        assert!(err.to_string().contains("Failed to create"));
    }
}
