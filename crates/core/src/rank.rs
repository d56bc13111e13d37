use std::cmp::Ordering;

use crate::pearson::Correlation;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Partner {
    pub column: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RankedResult {
    /// Every coefficient, in original column order.
    Full(Vec<Correlation>),
    /// Best partners, highest correlation first.
    Top(Vec<Partner>),
}

impl RankedResult {
    pub fn len(&self) -> usize {
        match self {
            RankedResult::Full(values) => values.len(),
            RankedResult::Top(partners) => partners.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reduce one column's correlations to the output row.
///
/// `top_n == 0` passes the vector through. Otherwise the non-missing
/// entries are ordered by descending coefficient and the first `top_n`
/// are kept; equal coefficients keep ascending column order. Fewer than
/// `top_n` partners come back when not enough coefficients exist.
pub fn rank(correlations: Vec<Correlation>, top_n: usize) -> RankedResult {
    if top_n == 0 {
        return RankedResult::Full(correlations);
    }
    RankedResult::Top(top_partners(&correlations, top_n))
}

pub fn top_partners(correlations: &[Correlation], top_n: usize) -> Vec<Partner> {
    let mut candidates: Vec<Partner> = correlations
        .iter()
        .enumerate()
        .filter_map(|(column, r)| r.value().map(|value| Partner { column, value }))
        .collect();

    // Stable: ties stay in column order.
    candidates.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    candidates.truncate(top_n);
    candidates
}
