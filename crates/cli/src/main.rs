// Output Pearson correlations between the columns of a tab-separated matrix.
// Missing (non-numeric) cells are skipped pairwise.

use std::{
    env,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use anyhow::{Context, Result};
use clap::Parser;
use flate2::{write::GzEncoder, Compression};
use pcorr::{
    load_matrix, read_matrix, run, Matrix, RowFormatter, RowOrder, RunConfig, RunSummary,
    MIN_SAMPLES_DEFAULT,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const THREADS_ENV: &str = "PCOR_NUM_THREADS";

/// Output Pearson correlations between input matrix columns.
///
/// Without -n, writes all pairwise correlations as a large matrix with a
/// header line. With -n, writes each column label followed by the labels of
/// its N most correlated columns.
#[derive(Parser, Debug)]
#[command(name = "pcor", version)]
struct Cli {
    /// Tab-separated matrix (plain, .gz or .tar.gz). Reads stdin if omitted or "-".
    input: Option<PathBuf>,

    /// Output the top N most correlated column labels instead of the full matrix
    #[arg(short = 'n', long = "top-n", default_value_t = 0)]
    top_n: usize,

    /// Pairwise columns need at least N mutually non-NaN samples to be correlated
    #[arg(short = 'm', long, default_value_t = MIN_SAMPLES_DEFAULT)]
    min_samples: usize,

    /// Worker threads (defaults to $PCOR_NUM_THREADS, then all available cores)
    #[arg(short = 'p', long)]
    threads: Option<usize>,

    /// Row order: "column" (input order) or "completion" (as finished)
    #[arg(long, default_value_t = RowOrder::Column)]
    order: RowOrder,

    /// Token written for correlations that could not be computed
    #[arg(long, default_value = pcorr::output::MISSING_TOKEN_DEFAULT)]
    missing_token: String,

    /// Fixed number of decimals (default: shortest exact representation)
    #[arg(long)]
    precision: Option<usize>,

    /// Write to this file instead of stdout; ".gz" paths are compressed
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn read_input(input: Option<&Path>) -> Result<Matrix> {
    match input {
        Some(path) if path != Path::new("-") => load_matrix(path)
            .with_context(|| format!("failed to load matrix from {}", path.display())),
        _ => read_matrix(io::stdin().lock()).context("failed to load matrix from stdin"),
    }
}

fn write_output(
    matrix: &Matrix,
    config: &RunConfig,
    formatter: &RowFormatter,
    output: Option<&Path>,
) -> Result<RunSummary> {
    let Some(path) = output else {
        return Ok(run(matrix, config, formatter, BufWriter::new(io::stdout()))?);
    };

    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut enc = GzEncoder::new(BufWriter::new(file), Compression::default());
        let summary = run(matrix, config, formatter, &mut enc)?;
        enc.finish()?.flush()?;
        Ok(summary)
    } else {
        Ok(run(matrix, config, formatter, BufWriter::new(file))?)
    }
}

fn execute(cli: Cli) -> Result<()> {
    let env_threads = env::var(THREADS_ENV).ok();
    let config = RunConfig {
        min_samples: cli.min_samples,
        top_n: cli.top_n,
        threads: RunConfig::resolve_threads(cli.threads, env_threads.as_deref()),
        order: cli.order,
    };
    let formatter = RowFormatter::new(cli.missing_token, cli.precision);

    let load_start = Instant::now();
    let matrix = read_input(cli.input.as_deref())?;
    info!(
        rows = matrix.n_rows(),
        cols = matrix.n_cols(),
        seconds = load_start.elapsed().as_secs_f64(),
        "matrix loaded"
    );

    // Fail before an output file is created.
    config.validate(&matrix)?;

    let summary = write_output(&matrix, &config, &formatter, cli.output.as_deref())?;
    info!(
        rows = summary.rows,
        threads = summary.threads,
        total_seconds = load_start.elapsed().as_secs_f64(),
        "done"
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}
