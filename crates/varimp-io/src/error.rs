//! I/O error types for varimp-io.

use std::path::PathBuf;

/// Errors from dataset reading, model loading, and result serialization.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when an input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the CSV file contains a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a cell is NaN, Inf, or not a float.
    #[error("non-finite value in {path}: row {row_index}, column \"{column}\", raw value \"{raw}\"")]
    NonFiniteValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Header name of the offending column.
        column: String,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when the requested target column is not in the header.
    #[error("target column \"{column}\" not found in {path}")]
    MissingTargetColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// Requested column name.
        column: String,
    },

    /// Returned when the header has no columns besides the target.
    #[error("no feature columns in {path}")]
    NoFeatureColumns {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a labels target holds a value that is not a non-negative integer.
    #[error("non-integral class label in {path}: row {row_index}, raw value \"{raw}\"")]
    NonIntegralLabel {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// The raw string value.
        raw: String,
    },

    /// Returned when the feature columns do not form a valid table.
    #[error("invalid feature table in {path}")]
    InvalidTable {
        /// Path to the CSV file.
        path: PathBuf,
        /// Underlying validation error.
        source: varimp_core::ImportanceError,
    },

    /// Returned when a model file is not valid model JSON.
    #[error("cannot parse model file {path}")]
    ModelParse {
        /// Path to the model file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when a model file parses but describes an unusable model.
    #[error("invalid model: {reason}")]
    InvalidModel {
        /// What is wrong with the model.
        reason: String,
    },

    /// Returned when a model weight names a feature the table does not have.
    #[error("model feature \"{feature}\" is not a column of the table")]
    UnknownModelFeature {
        /// The missing feature name.
        feature: String,
    },

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a result cannot be serialized to JSON.
    #[error("cannot serialize {path}")]
    Serialize {
        /// Destination path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
