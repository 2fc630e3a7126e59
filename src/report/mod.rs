//! Text reports over a [`StateTable`](crate::table::StateTable).
//!
//! Each report is first computed into serializable result structs and then
//! rendered as text tables, so the same results can be printed or emitted as
//! JSON.

mod sched;
mod summary;

pub use sched::{
    build_sched_report, sched_report, write_sched_report, CategoryReport, GroupStats, SchedReport,
    StateCategory,
};
pub use summary::{
    states_summary, thread_summaries, CpuShare, CpuStats, StateStats, StateTotal, ThreadSummary,
};

use std::io::Write;

use anyhow::Result;

use crate::stats::Describe;

/// Width of the separator lines between report sections.
const RULE_WIDTH: usize = 100;

/// Widest a table column is allowed to grow.
const MAX_COLUMN_WIDTH: usize = 50;

/// Print a section title followed by a dashed rule.
fn write_heading(out: &mut dyn Write, title: &str) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
    Ok(())
}

/// Format a report value: two decimals, `NaN` spelled out.
fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        format!("{v:.2}")
    }
}

/// Label for an optional CPU.
fn cpu_label(cpu: Option<i32>) -> String {
    match cpu {
        Some(cpu) => format!("CPU{cpu}"),
        None => "CPU?".to_string(),
    }
}

/// Describe columns for a row, count printed as an integer.
fn describe_cells(d: &Describe) -> Vec<String> {
    let mut cells = vec![d.count.to_string()];
    cells.extend(d.values()[1..].iter().map(|v| fmt_value(*v)));
    cells
}

/// Headers for a describe table keyed by `keys`.
fn describe_headers(keys: &[&str]) -> Vec<String> {
    let mut headers: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    headers.extend(Describe::headers().iter().map(|h| h.to_string()));
    headers
}

/// Print an aligned text table. Key columns are left aligned, the rest right aligned.
fn write_table(
    out: &mut dyn Write,
    headers: &[String],
    key_columns: usize,
    rows: &[Vec<String>],
) -> Result<()> {
    if rows.is_empty() {
        writeln!(out, "(no results)")?;
        return Ok(());
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, val) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(val.chars().count());
            }
        }
    }

    for w in &mut widths {
        *w = (*w).min(MAX_COLUMN_WIDTH);
    }

    let render = |cells: &[String]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let width = widths.get(i).copied().unwrap_or(10);
                let v = truncate(v, width);
                if i < key_columns {
                    format!("{v:<width$}")
                } else {
                    format!("{v:>width$}")
                }
            })
            .collect::<Vec<String>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    writeln!(out, "{}", render(headers))?;
    for row in rows {
        writeln!(out, "{}", render(row.as_slice()))?;
    }
    Ok(())
}

fn truncate(v: &str, width: usize) -> String {
    if v.chars().count() > width && width > 3 {
        let kept: String = v.chars().take(width - 3).collect();
        format!("{kept}...")
    } else {
        v.to_string()
    }
}
