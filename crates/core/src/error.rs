use thiserror::Error;

/// Input could not be turned into a well-formed matrix.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("input is empty: expected a header line with column labels")]
    Empty,

    #[error("header line has no column labels")]
    NoColumns,

    #[error("input has a header but no data rows")]
    NoRows,

    #[error("line {line}: expected {expected} fields (row label + columns), found {found}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("grid is {rows}x{cols} but {labels} {axis} labels were given")]
    LabelMismatch {
        axis: &'static str,
        rows: usize,
        cols: usize,
        labels: usize,
    },

    #[error("no regular file found in tar archive")]
    EmptyArchive,

    #[error("malformed tab-separated input: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// Run configuration that cannot be applied to the loaded matrix.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("top-n={top_n} is greater than # matrix columns ({columns})")]
    TopNExceedsColumns { top_n: usize, columns: usize },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}
