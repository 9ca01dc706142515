//! Feature tables and target vectors.

use std::collections::HashSet;

use crate::error::ImportanceError;

/// An immutable, column-major table of named `f64` features.
///
/// Guaranteed to have at least one column and one row, equal-length columns,
/// and unique non-empty feature names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
}

impl FeatureTable {
    /// Build a table from parallel name and column vectors.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ImportanceError::EmptyTable`] | no columns, or columns with zero rows |
    /// | [`ImportanceError::ColumnLength`] | a column's length differs from the first column's |
    /// | [`ImportanceError::ColumnCount`] | names and columns differ in count |
    /// | [`ImportanceError::DuplicateFeature`] | a name is empty or repeated |
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self, ImportanceError> {
        if names.is_empty() || columns.is_empty() {
            return Err(ImportanceError::EmptyTable);
        }
        if names.len() != columns.len() {
            return Err(ImportanceError::ColumnCount {
                names: names.len(),
                columns: columns.len(),
            });
        }
        let n_rows = columns[0].len();
        if n_rows == 0 {
            return Err(ImportanceError::EmptyTable);
        }

        let mut seen = HashSet::with_capacity(names.len());
        for (name, column) in names.iter().zip(&columns) {
            if name.is_empty() || !seen.insert(name.as_str()) {
                return Err(ImportanceError::DuplicateFeature {
                    feature: name.clone(),
                });
            }
            if column.len() != n_rows {
                return Err(ImportanceError::ColumnLength {
                    feature: name.clone(),
                    expected: n_rows,
                    got: column.len(),
                });
            }
        }

        Ok(Self {
            names,
            columns,
            n_rows,
        })
    }

    /// Build a table from row-major data: `rows[sample_index][feature_index]`.
    ///
    /// # Errors
    ///
    /// Same as [`FeatureTable::new`]; a short or long row is reported as
    /// [`ImportanceError::ColumnLength`] on the first column it disagrees with.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self, ImportanceError> {
        let n_features = names.len();
        for row in rows {
            if row.len() != n_features {
                let idx = row.len().min(n_features.saturating_sub(1));
                return Err(ImportanceError::ColumnLength {
                    feature: names.get(idx).cloned().unwrap_or_default(),
                    expected: rows.len(),
                    got: rows.iter().filter(|r| r.len() > idx).count(),
                });
            }
        }
        let columns = (0..n_features)
            .map(|f| rows.iter().map(|row| row[f]).collect())
            .collect();
        Self::new(names, columns)
    }

    /// Build a table whose invariants the caller already upholds.
    pub(crate) fn from_parts_unchecked(names: Vec<String>, columns: Vec<Vec<f64>>) -> Self {
        let n_rows = columns.first().map_or(0, Vec::len);
        debug_assert!(columns.iter().all(|c| c.len() == n_rows));
        Self {
            names,
            columns,
            n_rows,
        }
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    /// Return the feature names in column order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    /// Return the position of a feature by name.
    #[must_use]
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Return one column by position.
    ///
    /// # Panics
    ///
    /// Panics if `feature_index >= n_features()`.
    #[must_use]
    pub fn column(&self, feature_index: usize) -> &[f64] {
        &self.columns[feature_index]
    }

    /// Return one column by name.
    #[must_use]
    pub fn column_by_name(&self, name: &str) -> Option<&[f64]> {
        self.feature_index(name).map(|idx| self.column(idx))
    }

    /// Return all columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Copy one row into a new vector, in column order.
    ///
    /// # Panics
    ///
    /// Panics if `row_index >= n_rows()`.
    #[must_use]
    pub fn row(&self, row_index: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[row_index]).collect()
    }
}

/// True outcome values, row-aligned with a [`FeatureTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Numeric regression targets.
    Values(Vec<f64>),
    /// Zero-based class labels.
    Labels(Vec<usize>),
}

impl Target {
    /// Return the number of target values.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Values(v) => v.len(),
            Self::Labels(l) => l.len(),
        }
    }

    /// Return true if there are no target values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<f64>> for Target {
    fn from(values: Vec<f64>) -> Self {
        Self::Values(values)
    }
}

impl From<Vec<usize>> for Target {
    fn from(labels: Vec<usize>) -> Self {
        Self::Labels(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: &[&str]) -> Vec<String> {
        n.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn new_valid_table() {
        let t = FeatureTable::new(names(&["a", "b"]), vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.n_features(), 2);
        assert_eq!(t.column_by_name("b").unwrap(), &[3.0, 4.0]);
        assert_eq!(t.row(1), vec![2.0, 4.0]);
        assert_eq!(t.feature_index("a"), Some(0));
        assert_eq!(t.feature_index("z"), None);
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            FeatureTable::new(vec![], vec![]),
            Err(ImportanceError::EmptyTable)
        ));
        assert!(matches!(
            FeatureTable::new(names(&["a"]), vec![vec![]]),
            Err(ImportanceError::EmptyTable)
        ));
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = FeatureTable::new(names(&["a", "b"]), vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err,
            ImportanceError::ColumnLength { ref feature, expected: 2, got: 1 } if feature == "b"
        ));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = FeatureTable::new(names(&["a", "a"]), vec![vec![1.0], vec![2.0]]).unwrap_err();
        assert!(matches!(err, ImportanceError::DuplicateFeature { .. }));
    }

    #[test]
    fn rejects_name_column_count_mismatch() {
        let err = FeatureTable::new(names(&["a", "b", "c"]), vec![vec![1.0], vec![2.0]]).unwrap_err();
        assert!(matches!(err, ImportanceError::ColumnCount { names: 3, columns: 2 }));
        assert_eq!(err.to_string(), "3 feature names for 2 columns");

        let err = FeatureTable::new(names(&["a"]), vec![vec![1.0], vec![2.0]]).unwrap_err();
        assert!(matches!(err, ImportanceError::ColumnCount { names: 1, columns: 2 }));
    }

    #[test]
    fn from_rows_transposes() {
        let t = FeatureTable::from_rows(names(&["x", "y"]), &[vec![1.0, 10.0], vec![2.0, 20.0]])
            .unwrap();
        assert_eq!(t.column(0), &[1.0, 2.0]);
        assert_eq!(t.column(1), &[10.0, 20.0]);
    }

    #[test]
    fn from_rows_rejects_short_row() {
        let err = FeatureTable::from_rows(names(&["x", "y"]), &[vec![1.0, 10.0], vec![2.0]])
            .unwrap_err();
        assert!(matches!(err, ImportanceError::ColumnLength { .. }));
    }

    #[test]
    fn target_len() {
        assert_eq!(Target::from(vec![1.0, 2.0]).len(), 2);
        assert_eq!(Target::from(vec![0usize, 1, 2]).len(), 3);
        assert!(Target::Labels(vec![]).is_empty());
    }
}
