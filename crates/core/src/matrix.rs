use std::{fs::File, io::Read, path::Path};

use csv::ReaderBuilder;
use flate2::read::{GzDecoder, MultiGzDecoder};
use ndarray::{Array2, ArrayView1};
use tar::Archive;

use crate::error::FormatError;

/// Row labels, column labels and an R x C grid; missing cells hold NaN.
#[derive(Debug, Clone)]
pub struct Matrix {
    index: Vec<String>,
    columns: Vec<String>,
    data: Array2<f64>,
}

impl Matrix {
    pub fn new(
        index: Vec<String>,
        columns: Vec<String>,
        data: Array2<f64>,
    ) -> Result<Self, FormatError> {
        let (rows, cols) = data.dim();
        if cols == 0 || columns.is_empty() {
            return Err(FormatError::NoColumns);
        }
        if rows == 0 || index.is_empty() {
            return Err(FormatError::NoRows);
        }
        if index.len() != rows {
            return Err(FormatError::LabelMismatch {
                axis: "row",
                rows,
                cols,
                labels: index.len(),
            });
        }
        if columns.len() != cols {
            return Err(FormatError::LabelMismatch {
                axis: "column",
                rows,
                cols,
                labels: columns.len(),
            });
        }
        Ok(Self {
            index,
            columns,
            data,
        })
    }

    pub fn from_rows(
        index: Vec<String>,
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, FormatError> {
        let n_rows = rows.len();
        let n_cols = columns.len();
        if n_cols == 0 {
            return Err(FormatError::NoColumns);
        }
        let mut flat = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(FormatError::FieldCount {
                    line: i as u64 + 2,
                    expected: n_cols + 1,
                    found: row.len() + 1,
                });
            }
            flat.extend(row);
        }
        let data = Array2::from_shape_vec((n_rows, n_cols), flat).map_err(|_| {
            FormatError::LabelMismatch {
                axis: "row",
                rows: n_rows,
                cols: n_cols,
                labels: index.len(),
            }
        })?;
        Self::new(index, columns, data)
    }

    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn column(&self, j: usize) -> ArrayView1<'_, f64> {
        self.data.column(j)
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }
}

fn parse_cell(field: &str) -> f64 {
    field.trim().parse().unwrap_or(f64::NAN)
}

/// Read a tab-separated matrix: a header line whose first field is ignored,
/// then one line per row holding a label and one field per column.
pub fn read_matrix<R: Read>(reader: R) -> Result<Matrix, FormatError> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let header = rdr.headers()?.clone();
    if header.is_empty() {
        return Err(FormatError::Empty);
    }
    let columns: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
    if columns.is_empty() {
        return Err(FormatError::NoColumns);
    }
    let expected = columns.len() + 1;

    let mut index = Vec::new();
    let mut flat = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() != expected {
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(idx as u64 + 2);
            return Err(FormatError::FieldCount {
                line,
                expected,
                found: record.len(),
            });
        }
        index.push(record.get(0).unwrap_or("").to_string());
        flat.extend(record.iter().skip(1).map(parse_cell));
    }

    if index.is_empty() {
        return Err(FormatError::NoRows);
    }

    let data = Array2::from_shape_vec((index.len(), columns.len()), flat).map_err(|_| {
        FormatError::LabelMismatch {
            axis: "row",
            rows: index.len(),
            cols: columns.len(),
            labels: index.len(),
        }
    })?;
    Matrix::new(index, columns, data)
}

/// Load a matrix from a plain, `.gz` or `.tar.gz` file.
pub fn load_matrix(path: &Path) -> Result<Matrix, FormatError> {
    let name = path.to_string_lossy();
    let matrix = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let mut archive = Archive::new(GzDecoder::new(File::open(path)?));
        let mut found = None;
        for entry in archive.entries()? {
            let entry = entry?;
            if entry.header().entry_type().is_file() {
                found = Some(read_matrix(entry)?);
                break;
            }
        }
        found.ok_or(FormatError::EmptyArchive)?
    } else if name.ends_with(".gz") {
        read_matrix(MultiGzDecoder::new(File::open(path)?))?
    } else {
        read_matrix(File::open(path)?)?
    };
    tracing::debug!(
        path = %path.display(),
        rows = matrix.n_rows(),
        cols = matrix.n_cols(),
        "matrix loaded"
    );
    Ok(matrix)
}
