pub mod engine;
pub mod error;
pub mod matrix;
pub mod output;
pub mod pearson;
pub mod rank;

pub use engine::{correlate_column, run, RowOrder, RunConfig, RunSummary};
pub use error::{ConfigError, EngineError, FormatError};
pub use matrix::{load_matrix, read_matrix, Matrix};
pub use output::RowFormatter;
pub use pearson::{Correlation, MIN_SAMPLES_DEFAULT};
pub use rank::{Partner, RankedResult};
