//! CSV dataset reader with full input validation.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};
use varimp_core::{FeatureTable, Target};

use crate::IoError;
use crate::domain::Dataset;

/// Reads a feature table and its target from a CSV file.
///
/// Expected CSV format:
/// - Header row required; every column is numeric
/// - The column named by `target` becomes the [`Target`]; all other
///   columns, minus any ignored ones, become features in header order
///
/// With [`with_labels`](Self::with_labels) the target is read as class
/// labels and each value must be a non-negative integer (`2` or `2.0`).
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingTargetColumn`] | No header column named `target` |
/// | [`IoError::NoFeatureColumns`] | Nothing left besides the target and ignored columns |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Cell is NaN, Inf, or unparseable float |
/// | [`IoError::NonIntegralLabel`] | Labels target holds a fractional or negative value |
/// | [`IoError::InvalidTable`] | Duplicate feature names in the header |
pub struct DatasetReader {
    path: PathBuf,
    target: String,
    labels: bool,
    ignored: Vec<String>,
}

impl DatasetReader {
    /// Create a new reader for the given CSV file and target column.
    pub fn new(path: &Path, target: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            target: target.into(),
            labels: false,
            ignored: Vec::new(),
        }
    }

    /// Read the target as class labels instead of real values.
    #[must_use]
    pub fn with_labels(mut self, labels: bool) -> Self {
        self.labels = labels;
        self
    }

    /// Skip these columns entirely (e.g. row identifiers). Unknown names are ignored.
    #[must_use]
    pub fn with_ignored_columns(mut self, columns: Vec<String>) -> Self {
        self.ignored = columns;
        self
    }

    /// Read and validate the CSV file, returning a [`Dataset`].
    #[instrument(skip(self), fields(path = %self.path.display(), target = %self.target))]
    pub fn read(&self) -> Result<Dataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so that our InconsistentRowLength check fires
        // instead of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let expected_cols = header.len();

        let target_col = header
            .iter()
            .position(|name| name == self.target)
            .ok_or_else(|| IoError::MissingTargetColumn {
                path: self.path.clone(),
                column: self.target.clone(),
            })?;
        let feature_cols: Vec<usize> = (0..expected_cols)
            .filter(|&c| c != target_col && !self.ignored.iter().any(|i| i == &header[c]))
            .collect();
        if feature_cols.is_empty() {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        let feature_names: Vec<String> = feature_cols.iter().map(|&c| header[c].to_string()).collect();
        debug!(expected_cols, n_features = feature_names.len(), "read CSV header");

        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); feature_cols.len()];
        let mut values = Vec::new();
        let mut labels = Vec::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            for (dst, &col) in columns.iter_mut().zip(&feature_cols) {
                dst.push(self.parse_finite(&record[col], row_index, &header[col])?);
            }

            let raw = &record[target_col];
            let value = self.parse_finite(raw, row_index, &self.target)?;
            if self.labels {
                if value < 0.0 || value.fract() != 0.0 {
                    return Err(IoError::NonIntegralLabel {
                        path: self.path.clone(),
                        row_index,
                        raw: raw.to_string(),
                    });
                }
                labels.push(value as usize);
            } else {
                values.push(value);
            }
        }

        let n_rows = columns[0].len();
        if n_rows == 0 {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let table = FeatureTable::new(feature_names, columns).map_err(|e| IoError::InvalidTable {
            path: self.path.clone(),
            source: e,
        })?;
        let target = if self.labels {
            Target::Labels(labels)
        } else {
            Target::Values(values)
        };

        info!(
            n_rows,
            n_features = table.n_features(),
            labels = self.labels,
            "dataset loaded"
        );
        Ok(Dataset::new(table, self.target.clone(), target))
    }

    fn parse_finite(&self, raw: &str, row_index: usize, column: &str) -> Result<f64, IoError> {
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(IoError::NonFiniteValue {
                path: self.path.clone(),
                row_index,
                column: column.to_string(),
                raw: raw.to_string(),
            }),
        }
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}
