use std::io;

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::pearson::Correlation;
use crate::rank::RankedResult;

pub const MISSING_TOKEN_DEFAULT: &str = "NaN";

/// Renders result rows as complete tab-separated lines.
#[derive(Debug, Clone)]
pub struct RowFormatter {
    missing_token: String,
    precision: Option<usize>,
}

impl Default for RowFormatter {
    fn default() -> Self {
        Self {
            missing_token: MISSING_TOKEN_DEFAULT.to_string(),
            precision: None,
        }
    }
}

impl RowFormatter {
    pub fn new(missing_token: impl Into<String>, precision: Option<usize>) -> Self {
        Self {
            missing_token: missing_token.into(),
            precision,
        }
    }

    pub fn format_value(&self, r: Correlation) -> String {
        match (r, self.precision) {
            (Correlation::Missing, _) => self.missing_token.clone(),
            (r, Some(p)) => format!("{:.*}", p, r),
            (r, None) => r.to_string(),
        }
    }

    /// Full-matrix header: an empty leading field, then every column label.
    pub fn header(&self, columns: &[String]) -> io::Result<Vec<u8>> {
        line(std::iter::once("").chain(columns.iter().map(String::as_str)))
    }

    /// One result row: the column's own label, then either every value in
    /// column order or the partner labels best first.
    pub fn row(
        &self,
        label: &str,
        ranked: &RankedResult,
        columns: &[String],
    ) -> io::Result<Vec<u8>> {
        match ranked {
            RankedResult::Full(values) => {
                let vals: Vec<String> = values.iter().map(|&r| self.format_value(r)).collect();
                line(std::iter::once(label).chain(vals.iter().map(String::as_str)))
            }
            RankedResult::Top(partners) => line(
                std::iter::once(label).chain(partners.iter().map(|p| columns[p.column].as_str())),
            ),
        }
    }
}

fn line<'a, I>(fields: I) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a str>,
{
    let fields: Vec<&str> = fields.into_iter().collect();
    // csv quotes a lone empty field even with QuoteStyle::Never.
    if let [""] = fields.as_slice() {
        return Ok(b"\n".to_vec());
    }

    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    wtr.write_record(fields)?;
    wtr.into_inner().map_err(|e| e.into_error())
}
