//! Per-thread state summaries.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use super::{
    cpu_label, describe_cells, describe_headers, fmt_value, write_heading, write_table, RULE_WIDTH,
};
use crate::chart::ChartRenderer;
use crate::stats::{round2, Describe};
use crate::table::{
    describe_groups, distinct, filter_name, filter_name_contains, filter_states, filter_tid,
    group_durations, sorted_distinct, sum_dur, StateTable,
};
use crate::trace::constants::{CHART_WIDTH, RUNNING_STATES, STATE_SLEEPING};
use crate::trace::StateInterval;

/// Total time spent in one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTotal {
    pub state: String,
    pub sum_ms: f64,
}

/// Duration statistics for one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateStats {
    pub state: String,
    pub stats: Describe,
}

/// Running duration statistics on one CPU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuStats {
    pub cpu: Option<i32>,
    pub stats: Describe,
}

/// Total running time on one CPU and its share of the thread's running time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuShare {
    pub cpu: Option<i32>,
    pub sum_ms: f64,
    pub percent: f64,
}

/// Everything reported for one (thread name, tid) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadSummary {
    /// Pattern the thread name matched.
    pub pattern: String,
    pub name: String,
    pub tid: i64,
    /// Per-state totals for the bar chart, `S` left out.
    pub state_totals: Vec<StateTotal>,
    pub state_stats: Vec<StateStats>,
    pub running_stats: Vec<CpuStats>,
    pub running_shares: Vec<CpuShare>,
}

/// Build the summaries of every thread whose name contains one of `patterns`.
///
/// Patterns are handled in the order given. Within a pattern, thread names are
/// visited in lexicographic order and tids in the order they appear in the table.
pub fn thread_summaries(table: &StateTable, patterns: &[String]) -> Vec<ThreadSummary> {
    let all: Vec<&StateInterval> = table.rows().iter().collect();
    let mut summaries = Vec::new();

    for pattern in patterns {
        let matched = filter_name_contains(&all, pattern);
        let names: Vec<String> = sorted_distinct(&matched, |r| r.name.clone())
            .into_iter()
            .flatten()
            .collect();

        for name in names {
            let by_name = filter_name(&matched, &name);
            for tid in distinct(&by_name, |r| r.tid) {
                let rows = filter_tid(&by_name, tid);
                summaries.push(summarize_thread(pattern, &name, tid, &rows));
            }
        }
    }
    summaries
}

fn summarize_thread(pattern: &str, name: &str, tid: i64, rows: &[&StateInterval]) -> ThreadSummary {
    let state_totals = sorted_distinct(rows, |r| r.state.clone())
        .into_iter()
        .filter(|s| s != STATE_SLEEPING)
        .map(|state| {
            let in_state = filter_states(rows, &[state.as_str()]);
            StateTotal {
                sum_ms: sum_dur(&in_state),
                state,
            }
        })
        .collect();

    let state_stats = describe_groups(&group_durations(rows, |r| r.state.clone()))
        .into_iter()
        .map(|(state, stats)| StateStats { state, stats })
        .collect();

    let running = filter_states(rows, &RUNNING_STATES);
    let by_cpu = group_durations(&running, |r| r.cpu);

    let running_stats = describe_groups(&by_cpu)
        .into_iter()
        .map(|(cpu, stats)| CpuStats { cpu, stats })
        .collect();

    let sums: Vec<(Option<i32>, f64)> = by_cpu
        .iter()
        .map(|(cpu, durs)| (*cpu, round2(durs.iter().sum())))
        .collect();
    let total: f64 = sums.iter().map(|(_, s)| s).sum();
    let running_shares = sums
        .into_iter()
        .map(|(cpu, sum_ms)| CpuShare {
            cpu,
            sum_ms,
            percent: round2(sum_ms * 100.0 / total),
        })
        .collect();

    ThreadSummary {
        pattern: pattern.to_string(),
        name: name.to_string(),
        tid,
        state_totals,
        state_stats,
        running_stats,
        running_shares,
    }
}

/// Print per-thread state summaries with bar charts for every thread whose
/// name contains one of `patterns`. Does nothing for an empty table.
pub fn states_summary(
    table: &StateTable,
    chart: &mut dyn ChartRenderer,
    patterns: &[String],
    out: &mut dyn Write,
) -> Result<()> {
    if table.is_empty() {
        return Ok(());
    }

    let mut current: Option<(String, String)> = None;
    for summary in thread_summaries(table, patterns) {
        let key = (summary.pattern.clone(), summary.name.clone());
        if current.as_ref() != Some(&key) {
            writeln!(out)?;
            writeln!(out, "--:: {} ::--", summary.name)?;
            writeln!(out, "{}", "+".repeat(RULE_WIDTH))?;
            current = Some(key);
        }
        write_thread_summary(&summary, chart, out)?;
    }
    Ok(())
}

fn write_thread_summary(
    summary: &ThreadSummary,
    chart: &mut dyn ChartRenderer,
    out: &mut dyn Write,
) -> Result<()> {
    writeln!(out)?;
    let dashes = RULE_WIDTH.saturating_sub(summary.name.chars().count() + 2);
    writeln!(out, "--{}{}", summary.name, "-".repeat(dashes))?;

    let rows = vec![summary.tid.to_string()];

    let labels: Vec<String> = summary.state_totals.iter().map(|t| t.state.clone()).collect();
    let series: Vec<Vec<f64>> = summary.state_totals.iter().map(|t| vec![t.sum_ms]).collect();
    draw(chart, out, &rows, &series, &labels)?;

    writeln!(out)?;
    let labels: Vec<String> = summary.running_shares.iter().map(|s| cpu_label(s.cpu)).collect();
    let series: Vec<Vec<f64>> = summary.running_shares.iter().map(|s| vec![s.sum_ms]).collect();
    draw(chart, out, &rows, &series, &labels)?;

    write_heading(out, "Time in State (ms):")?;
    let table_rows: Vec<Vec<String>> = summary
        .state_stats
        .iter()
        .map(|s| {
            let mut row = vec![s.state.clone()];
            row.extend(describe_cells(&s.stats));
            row
        })
        .collect();
    write_table(out, &describe_headers(&["state"]), 1, &table_rows)?;

    write_heading(out, "Time Running on CPU (ms):")?;
    let table_rows: Vec<Vec<String>> = summary
        .running_stats
        .iter()
        .map(|s| {
            let mut row = vec![cpu_label(s.cpu)];
            row.extend(describe_cells(&s.stats));
            row
        })
        .collect();
    write_table(out, &describe_headers(&["cpu"]), 1, &table_rows)?;

    write_heading(out, "Sum Time Running on CPU (ms):")?;
    let headers = vec!["cpu".to_string(), "sum".to_string(), "%".to_string()];
    let table_rows: Vec<Vec<String>> = summary
        .running_shares
        .iter()
        .map(|s| vec![cpu_label(s.cpu), fmt_value(s.sum_ms), fmt_value(s.percent)])
        .collect();
    write_table(out, &headers, 1, &table_rows)?;

    Ok(())
}

/// Reset the chart, draw one stacked bar and flush it after pending text.
fn draw(
    chart: &mut dyn ChartRenderer,
    out: &mut dyn Write,
    rows: &[String],
    series: &[Vec<f64>],
    labels: &[String],
) -> Result<()> {
    out.flush()?;
    chart.clear();
    chart.clear_data();
    chart.simple_stacked_bar(rows, series, CHART_WIDTH, labels)?;
    chart.show()
}
