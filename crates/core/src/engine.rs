use std::{
    collections::BTreeMap,
    io::Write,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use rayon::{prelude::*, ThreadPoolBuilder};
use strum_macros::{Display, EnumString};
use tracing::{debug, info, trace};

use crate::error::{ConfigError, EngineError};
use crate::matrix::Matrix;
use crate::output::RowFormatter;
use crate::pearson::{pairwise_correlate, MIN_SAMPLES_DEFAULT};
use crate::rank::{rank, RankedResult};

/// Columns in flight per worker when rows are emitted in column order.
pub const REORDER_BLOCK_PER_THREAD: usize = 16;

/// Order in which finished rows reach the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RowOrder {
    /// Input column order. Rows that finish early wait in a reorder buffer.
    #[default]
    Column,
    /// Whichever row finishes first is written first.
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub min_samples: usize,
    /// 0 writes the full matrix.
    pub top_n: usize,
    /// `None` leaves the worker count to rayon.
    pub threads: Option<usize>,
    pub order: RowOrder,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            min_samples: MIN_SAMPLES_DEFAULT,
            top_n: 0,
            threads: None,
            order: RowOrder::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self, matrix: &Matrix) -> Result<(), ConfigError> {
        if self.top_n > matrix.n_cols() {
            return Err(ConfigError::TopNExceedsColumns {
                top_n: self.top_n,
                columns: matrix.n_cols(),
            });
        }
        Ok(())
    }

    /// Explicit count first, then the environment default; 0 or an
    /// unparseable value falls through to the next source.
    pub fn resolve_threads(explicit: Option<usize>, env_default: Option<&str>) -> Option<usize> {
        explicit.filter(|&n| n > 0).or_else(|| {
            env_default
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|&n| n > 0)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub threads: usize,
    /// Most finished rows held back at once waiting for an earlier column.
    pub peak_buffered: usize,
    pub elapsed: Duration,
}

/// Correlations of column `i` against every column, reduced for output.
pub fn correlate_column(matrix: &Matrix, i: usize, config: &RunConfig) -> RankedResult {
    let correlations = pairwise_correlate(matrix.data(), matrix.column(i), config.min_samples);
    rank(correlations, config.top_n)
}

struct Sink<W> {
    writer: W,
    order: RowOrder,
    next: usize,
    pending: BTreeMap<usize, Vec<u8>>,
    peak: usize,
    rows: usize,
}

impl<W: Write> Sink<W> {
    fn new(writer: W, order: RowOrder) -> Self {
        Self {
            writer,
            order,
            next: 0,
            pending: BTreeMap::new(),
            peak: 0,
            rows: 0,
        }
    }

    fn emit(&mut self, index: usize, line: Vec<u8>) -> std::io::Result<()> {
        match self.order {
            RowOrder::Completion => {
                self.writer.write_all(&line)?;
                self.rows += 1;
            }
            RowOrder::Column => {
                self.pending.insert(index, line);
                while let Some(ready) = self.pending.remove(&self.next) {
                    self.writer.write_all(&ready)?;
                    self.next += 1;
                    self.rows += 1;
                }
                self.peak = self.peak.max(self.pending.len());
            }
        }
        Ok(())
    }
}

/// Correlate every column against the matrix and write one row per column.
///
/// Columns are computed in parallel on a dedicated pool. Each row is
/// rendered by its worker and written whole while holding the sink lock,
/// so rows never interleave. In column order the columns are walked in
/// blocks of `REORDER_BLOCK_PER_THREAD * threads`, so at most one block of
/// rows waits in memory. Configuration errors are raised before anything
/// is written. `writer` is not buffered here.
pub fn run<W>(
    matrix: &Matrix,
    config: &RunConfig,
    formatter: &RowFormatter,
    mut writer: W,
) -> Result<RunSummary, EngineError>
where
    W: Write + Send,
{
    config.validate(matrix)?;

    let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("pcor-worker-{i}"));
    if let Some(n) = config.threads {
        builder = builder.num_threads(n);
    }
    let pool = builder.build()?;
    let threads = pool.current_num_threads();

    let n_cols = matrix.n_cols();
    info!(
        rows = matrix.n_rows(),
        cols = n_cols,
        threads,
        top_n = config.top_n,
        min_samples = config.min_samples,
        order = %config.order,
        "computing Pearson correlations"
    );
    let start = Instant::now();

    if config.top_n == 0 {
        writer.write_all(&formatter.header(matrix.columns())?)?;
    }

    let block = match config.order {
        RowOrder::Column => REORDER_BLOCK_PER_THREAD * threads,
        RowOrder::Completion => n_cols,
    }
    .max(1);

    let sink = Mutex::new(Sink::new(writer, config.order));
    let emit_column = |i: usize| -> std::io::Result<()> {
        let ranked = correlate_column(matrix, i, config);
        let line = formatter.row(&matrix.columns()[i], &ranked, matrix.columns())?;
        trace!(column = i, entries = ranked.len(), "column done");
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .emit(i, line)
    };
    pool.install(|| {
        (0..n_cols).step_by(block).try_for_each(|first| {
            let last = (first + block).min(n_cols);
            (first..last).into_par_iter().try_for_each(&emit_column)
        })
    })?;

    let mut sink = sink.into_inner().unwrap_or_else(PoisonError::into_inner);
    sink.writer.flush()?;
    debug!(peak_buffered = sink.peak, block, "sink drained");

    let summary = RunSummary {
        rows: sink.rows,
        threads,
        peak_buffered: sink.peak,
        elapsed: start.elapsed(),
    };
    info!(
        rows = summary.rows,
        seconds = summary.elapsed.as_secs_f64(),
        "correlations written"
    );
    Ok(summary)
}
