use std::fmt;

use ndarray::{Array2, ArrayBase, ArrayView1, Data, Ix2};
use rayon::prelude::*;

pub const MIN_SAMPLES_DEFAULT: usize = 3;

/// A Pearson coefficient, or the marker for a pair that could not be
/// correlated (too few mutual samples, zero variance).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correlation {
    Value(f64),
    Missing,
}

impl Correlation {
    pub fn value(self) -> Option<f64> {
        match self {
            Correlation::Value(r) => Some(r),
            Correlation::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Correlation::Missing)
    }

    /// NaN-encoded form for dense numeric output.
    pub fn to_f64(self) -> f64 {
        self.value().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correlation::Value(r) => match f.precision() {
                Some(p) => write!(f, "{:.*}", p, r),
                None => write!(f, "{}", r),
            },
            Correlation::Missing => f.write_str("NaN"),
        }
    }
}

/// Pearson correlation over the rows where both `x` and `y` are non-NaN.
pub fn pair(x: ArrayView1<f64>, y: ArrayView1<f64>, min_samples: usize) -> Correlation {
    assert_eq!(
        x.len(),
        y.len(),
        "Pearson correlation requires equal sample count in both vectors"
    );

    let mutual = || {
        x.iter()
            .zip(y.iter())
            .filter(|(a, b)| !a.is_nan() && !b.is_nan())
    };

    let mut n = 0usize;
    let (mut sum_x, mut sum_y) = (0.0, 0.0);
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for (&a, &b) in mutual() {
        n += 1;
        sum_x += a;
        sum_y += b;
        min_x = min_x.min(a);
        max_x = max_x.max(a);
        min_y = min_y.min(b);
        max_y = max_y.max(b);
    }

    if n == 0 || n < min_samples {
        return Correlation::Missing;
    }
    // Constant input: the centered sums would only hold rounding noise.
    if min_x == max_x || min_y == max_y {
        return Correlation::Missing;
    }

    let mean_x = sum_x / n as f64;
    let mean_y = sum_y / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (&a, &b) in mutual() {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return Correlation::Missing;
    }
    let r = sxy / (sxx * syy).sqrt();
    if r.is_finite() {
        Correlation::Value(r.clamp(-1.0, 1.0))
    } else {
        Correlation::Missing
    }
}

/// Correlate `reference` against every column of `data`.
pub fn pairwise_correlate<S>(
    data: &ArrayBase<S, Ix2>,
    reference: ArrayView1<f64>,
    min_samples: usize,
) -> Vec<Correlation>
where
    S: Data<Elem = f64>,
{
    data.columns()
        .into_iter()
        .map(|target| pair(reference, target, min_samples))
        .collect()
}

/// Column-by-column correlation matrix, NaN where a pair is missing.
pub fn correlation_matrix<S>(data: &ArrayBase<S, Ix2>, min_samples: usize) -> Array2<f64>
where
    S: Data<Elem = f64> + Sync,
{
    let n_cols = data.ncols();

    let col_results: Vec<Vec<Correlation>> = (0..n_cols)
        .into_par_iter()
        .map(|i| pairwise_correlate(data, data.column(i), min_samples))
        .collect();

    let mut corr = Array2::<f64>::from_elem((n_cols, n_cols), f64::NAN);
    for (i, row) in col_results.iter().enumerate() {
        for (j, r) in row.iter().enumerate() {
            corr[[i, j]] = r.to_f64();
        }
    }
    corr
}

pub fn matrix<S>(data: &ArrayBase<S, Ix2>) -> Array2<f64>
where
    S: Data<Elem = f64> + Sync,
{
    correlation_matrix(data, MIN_SAMPLES_DEFAULT)
}
