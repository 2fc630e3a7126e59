//! Whole-trace scheduling report: per-state statistics and the top threads
//! by runnable, running and uninterruptible sleep time.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use super::summary::StateStats;
use super::{describe_cells, describe_headers, write_heading, write_table};
use crate::chart::ChartRenderer;
use crate::stats::Describe;
use crate::table::{describe_groups, filter_named, filter_states, group_durations, StateTable};
use crate::trace::constants::{NR_TOP, RUNNABLE_STATES, RUNNING_STATES, USLEEP_STATES};
use crate::trace::StateInterval;

/// Disjoint state categories ranked by the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCategory {
    Runnable,
    Running,
    UninterruptibleSleep,
}

impl StateCategory {
    pub const ALL: [StateCategory; 3] = [Self::Runnable, Self::Running, Self::UninterruptibleSleep];

    /// State codes belonging to the category.
    pub fn states(&self) -> &'static [&'static str] {
        match self {
            Self::Runnable => &RUNNABLE_STATES,
            Self::Running => &RUNNING_STATES,
            Self::UninterruptibleSleep => &USLEEP_STATES,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Runnable => "Runnable",
            Self::Running => "Running",
            Self::UninterruptibleSleep => "Uninterruptible Sleep",
        }
    }
}

/// Duration statistics of one (thread name, tid) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub name: String,
    pub tid: i64,
    pub stats: Describe,
}

/// The two top-N rankings of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReport {
    pub category: StateCategory,
    pub top_by_max: Vec<GroupStats>,
    pub top_by_p90: Vec<GroupStats>,
}

/// Whole-trace report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedReport {
    pub states: Vec<StateStats>,
    /// Only categories with at least one named interval.
    pub categories: Vec<CategoryReport>,
}

/// Compute the report. Returns `None` for an empty table.
pub fn build_sched_report(table: &StateTable) -> Option<SchedReport> {
    if table.is_empty() {
        return None;
    }

    let all: Vec<&StateInterval> = table.rows().iter().collect();

    let states = describe_groups(&group_durations(&all, |r| r.state.clone()))
        .into_iter()
        .map(|(state, stats)| StateStats { state, stats })
        .collect();

    let categories = StateCategory::ALL
        .iter()
        .filter_map(|category| {
            let rows = filter_states(&all, category.states());
            let groups = group_stats(&rows);
            if groups.is_empty() {
                return None;
            }
            Some(CategoryReport {
                category: *category,
                top_by_max: top_by(&groups, |s| s.max, NR_TOP),
                top_by_p90: top_by(&groups, |s| s.p90, NR_TOP),
            })
        })
        .collect();

    Some(SchedReport { states, categories })
}

/// Rounded statistics per (name, tid), ordered by name then tid.
///
/// Rows without a thread name are left out. Their tid is not a reliable key
/// (intervals without thread metadata all carry the same placeholder tid).
fn group_stats(rows: &[&StateInterval]) -> Vec<GroupStats> {
    let named = filter_named(rows);
    if named.len() < rows.len() {
        debug!(
            "{} unnamed intervals left out of the rankings",
            rows.len() - named.len()
        );
    }
    describe_groups(&group_durations(&named, |r| (r.name.clone(), r.tid)))
        .into_iter()
        .filter_map(|((name, tid), stats)| name.map(|name| GroupStats { name, tid, stats }))
        .collect()
}

/// The `limit` groups with the largest `key`, ties kept in group order.
fn top_by<F>(groups: &[GroupStats], key: F, limit: usize) -> Vec<GroupStats>
where
    F: Fn(&Describe) -> f64,
{
    let mut ranked = groups.to_vec();
    ranked.sort_by(|a, b| key(&b.stats).total_cmp(&key(&a.stats)));
    ranked.truncate(limit);
    ranked
}

/// Print the whole-trace report. Does nothing for an empty table.
///
/// The chart renderer is not drawn on; it is taken so every report has the
/// same calling convention.
pub fn sched_report(
    table: &StateTable,
    _chart: &mut dyn ChartRenderer,
    out: &mut dyn Write,
) -> Result<()> {
    let Some(report) = build_sched_report(table) else {
        return Ok(());
    };
    write_sched_report(&report, out)
}

/// Render a computed report as text.
pub fn write_sched_report(report: &SchedReport, out: &mut dyn Write) -> Result<()> {
    write_heading(out, "States Summary (ms):")?;
    let rows: Vec<Vec<String>> = report
        .states
        .iter()
        .map(|s| {
            let mut row = vec![s.state.clone()];
            row.extend(describe_cells(&s.stats));
            row
        })
        .collect();
    write_table(out, &describe_headers(&["state"]), 1, &rows)?;

    for category in &report.categories {
        let title = category.category.title();
        write_ranking(
            out,
            &format!("Top {NR_TOP} {title} Tasks (ms) - sorted-by max:"),
            &category.top_by_max,
        )?;
        write_ranking(
            out,
            &format!("Top {NR_TOP} {title} Tasks (ms) - sorted-by 90%:"),
            &category.top_by_p90,
        )?;
    }
    Ok(())
}

fn write_ranking(out: &mut dyn Write, title: &str, groups: &[GroupStats]) -> Result<()> {
    write_heading(out, title)?;
    let rows: Vec<Vec<String>> = groups
        .iter()
        .map(|g| {
            let mut row = vec![g.name.clone(), g.tid.to_string()];
            row.extend(describe_cells(&g.stats));
            row
        })
        .collect();
    write_table(out, &describe_headers(&["name", "tid"]), 2, &rows)
}
