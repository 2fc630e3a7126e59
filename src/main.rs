//! sched-states: per-thread scheduling state reports from a trace database.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use sched_states::{
    build_sched_report, load_states, sched_report, states_save_csv, states_summary,
    thread_summaries, DuckDbSource, StateTable, TerminalChart,
};

#[derive(Parser)]
#[command(name = "sched-states")]
#[command(about = "Summarize per-thread scheduling states from a trace database")]
#[command(version)]
struct Cli {
    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-thread state summaries for threads matching the given name patterns
    Summary {
        #[command(flatten)]
        input: InputArgs,

        /// Substring of the thread names to report on (repeatable)
        #[arg(short, long = "thread", required = true)]
        threads: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Whole-trace state statistics and top threads per state category
    Report {
        #[command(flatten)]
        input: InputArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Write the normalized thread state table to <PREFIX>_sched_states.csv
    SaveCsv {
        /// Path to DuckDB database
        #[arg(short, long)]
        database: PathBuf,

        /// Output file prefix
        #[arg(short, long)]
        prefix: String,

        /// Only export rows from this trace
        #[arg(long)]
        trace_id: Option<String>,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["database", "csv"])))]
struct InputArgs {
    /// Path to DuckDB database
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Previously exported _sched_states.csv file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Only load rows from this trace (database input only)
    #[arg(long)]
    trace_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

/// Load the thread state table from a database or a CSV export.
fn load_table(input: InputArgs) -> Result<StateTable> {
    match (input.database, input.csv) {
        (Some(database), _) => {
            let mut source = DuckDbSource::open(&database, true)?.with_trace_id(input.trace_id);
            load_states(&mut source).with_context(|| {
                format!("Failed to load thread states from {}", database.display())
            })
        }
        (None, Some(csv)) => {
            if input.trace_id.is_some() {
                bail!("--trace-id only applies to --database input");
            }
            StateTable::load_csv(&csv)
        }
        (None, None) => bail!("One of --database or --csv is required"),
    }
}

fn run_summary(input: InputArgs, threads: Vec<String>, format: OutputFormat) -> Result<()> {
    let table = load_table(input)?;
    if table.is_empty() {
        debug!("No thread states loaded, nothing to summarize");
        return Ok(());
    }

    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Table => {
            let mut chart = TerminalChart::stdout();
            states_summary(&table, &mut chart, &threads, &mut out)?;
        }
        OutputFormat::Json => {
            let summaries = thread_summaries(&table, &threads);
            writeln!(out, "{}", serde_json::to_string_pretty(&summaries)?)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn run_report(input: InputArgs, format: OutputFormat) -> Result<()> {
    let table = load_table(input)?;
    if table.is_empty() {
        debug!("No thread states loaded, nothing to report");
        return Ok(());
    }

    let mut out = io::stdout().lock();
    match format {
        OutputFormat::Table => {
            let mut chart = TerminalChart::stdout();
            sched_report(&table, &mut chart, &mut out)?;
        }
        OutputFormat::Json => {
            if let Some(report) = build_sched_report(&table) {
                writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn run_save_csv(database: PathBuf, prefix: String, trace_id: Option<String>) -> Result<()> {
    let mut source = DuckDbSource::open(&database, true)?.with_trace_id(trace_id);
    let table = load_states(&mut source)?;
    let path = states_save_csv(&table, &prefix)?;
    eprintln!("Wrote {} intervals to {}", table.len(), path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Summary {
            input,
            threads,
            format,
        } => run_summary(input, threads, format),
        Commands::Report { input, format } => run_report(input, format),
        Commands::SaveCsv {
            database,
            prefix,
            trace_id,
        } => run_save_csv(database, prefix, trace_id),
    }
}
