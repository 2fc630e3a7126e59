//! Text bar charts.
//!
//! The reports only talk to the [`ChartRenderer`] trait. [`TerminalChart`]
//! draws horizontal stacked bars with block glyphs, one glyph per series.

use std::io::Write;

use anyhow::{bail, Result};

use crate::stats::round2;

/// Trait for drawing simple charts between report tables.
///
/// Callers reset the canvas with [`clear`](ChartRenderer::clear) and
/// [`clear_data`](ChartRenderer::clear_data), draw, then
/// [`show`](ChartRenderer::show) to flush the drawing.
pub trait ChartRenderer {
    /// Reset the canvas.
    fn clear(&mut self);

    /// Drop any data drawn since the last flush.
    fn clear_data(&mut self);

    /// Draw one horizontal stacked bar per entry of `rows`.
    ///
    /// `series[i][j]` is the value of series `i` for row `j`, `labels[i]`
    /// names series `i` and `width` is the total chart width in columns.
    fn simple_stacked_bar(
        &mut self,
        rows: &[String],
        series: &[Vec<f64>],
        width: usize,
        labels: &[String],
    ) -> Result<()>;

    /// Flush the drawing to the output.
    fn show(&mut self) -> Result<()>;
}

/// Fill glyphs, cycled through for each series.
const GLYPHS: [char; 8] = ['█', '▓', '▒', '░', '#', '=', '+', '*'];

/// Columns always left for the bar itself.
const MIN_BAR_WIDTH: usize = 10;

/// [`ChartRenderer`] drawing into a text buffer flushed to `W`.
pub struct TerminalChart<W: Write> {
    out: W,
    canvas: String,
}

impl TerminalChart<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalChart<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            canvas: String::new(),
        }
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ChartRenderer for TerminalChart<W> {
    fn clear(&mut self) {
        self.canvas.clear();
    }

    fn clear_data(&mut self) {
        self.canvas.clear();
    }

    fn simple_stacked_bar(
        &mut self,
        rows: &[String],
        series: &[Vec<f64>],
        width: usize,
        labels: &[String],
    ) -> Result<()> {
        if series.len() != labels.len() {
            bail!(
                "{} series but {} labels for stacked bar",
                series.len(),
                labels.len()
            );
        }
        if let Some(s) = series.iter().find(|s| s.len() != rows.len()) {
            bail!(
                "series has {} values but chart has {} rows",
                s.len(),
                rows.len()
            );
        }

        self.canvas
            .push_str(&render_stacked_bar(rows, series, width, labels));
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        self.out.write_all(self.canvas.as_bytes())?;
        self.out.flush()?;
        self.canvas.clear();
        Ok(())
    }
}

/// Render the bars and the legend.
fn render_stacked_bar(
    rows: &[String],
    series: &[Vec<f64>],
    width: usize,
    labels: &[String],
) -> String {
    let label_width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    let bar_width = width.saturating_sub(label_width + 1).max(MIN_BAR_WIDTH);

    let mut out = String::new();
    for (j, row) in rows.iter().enumerate() {
        let values: Vec<f64> = series.iter().map(|s| s[j].max(0.0)).collect();
        let cells = split_columns(&values, bar_width);

        let mut bar = String::with_capacity(bar_width * 3);
        for (i, n) in cells.iter().enumerate() {
            bar.extend(std::iter::repeat(GLYPHS[i % GLYPHS.len()]).take(*n));
        }
        out.push_str(&format!("{row:>label_width$} {bar}\n"));
    }

    let legend: Vec<String> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let total: f64 = series[i].iter().sum();
            format!("{} {label} {}", GLYPHS[i % GLYPHS.len()], round2(total))
        })
        .collect();
    out.push_str(&format!("{:label_width$} {}\n", "", legend.join("  ")));
    out
}

/// Split `width` columns across `values` proportionally.
///
/// Uses largest remainders so the columns always add up to `width` when the
/// total is non-zero. A zero total yields no columns.
fn split_columns(values: &[f64], width: usize) -> Vec<usize> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return vec![0; values.len()];
    }

    let exact: Vec<f64> = values
        .iter()
        .map(|v| v / total * width as f64)
        .collect();
    let mut cells: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra)
    });

    let assigned: usize = cells.iter().sum();
    for &i in order.iter().take(width.saturating_sub(assigned)) {
        cells[i] += 1;
    }
    cells
}
