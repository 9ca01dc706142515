//! Error types for varimp-core.

/// Boxed error returned by [`Predictor`](crate::Predictor) implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors from importance engine construction and runs.
#[derive(Debug, thiserror::Error)]
pub enum ImportanceError {
    /// Returned when a named loss is not in the metric registry.
    #[error("unknown metric \"{name}\" (registered: {registered})")]
    UnknownMetric {
        /// The name that was looked up.
        name: String,
        /// Comma-separated list of registered names.
        registered: String,
    },

    /// Returned when a loss is fed inputs of a shape it does not accept.
    #[error("metric {metric} cannot be evaluated: {reason}")]
    InvalidMetricShape {
        /// Label of the offending metric.
        metric: String,
        /// Human-readable description of the shape problem.
        reason: String,
    },

    /// Returned when a perturbation method name is not recognized.
    #[error("unsupported method \"{method}\" (expected shuffle or cartesian)")]
    UnsupportedMethod {
        /// The method name provided.
        method: String,
    },

    /// Returned when the target length differs from the feature table row count.
    #[error("target has {got} values, feature table has {expected} rows")]
    InvalidTarget {
        /// Number of rows in the feature table.
        expected: usize,
        /// Number of target values.
        got: usize,
    },

    /// Returned when the baseline error is zero and the configuration rejects it.
    #[error("baseline error of metric {metric} is zero; importance ratios are degenerate")]
    DegenerateBaseline {
        /// Label of the metric.
        metric: String,
    },

    /// Returned when a feature table has no columns or no rows.
    #[error("feature table must have at least one column and one row")]
    EmptyTable,

    /// Returned when a column's length differs from the first column's.
    #[error("column \"{feature}\" has {got} rows, expected {expected}")]
    ColumnLength {
        /// Name of the offending column.
        feature: String,
        /// Row count of the first column.
        expected: usize,
        /// Row count of the offending column.
        got: usize,
    },

    /// Returned when the number of feature names differs from the number of columns.
    #[error("{names} feature names for {columns} columns")]
    ColumnCount {
        /// Number of names given.
        names: usize,
        /// Number of columns given.
        columns: usize,
    },

    /// Returned when a feature name is empty or appears more than once.
    #[error("feature name \"{feature}\" is empty or duplicated")]
    DuplicateFeature {
        /// The offending name.
        feature: String,
    },

    /// Returned when the selected class is outside the predictor's class range.
    #[error("class {class} is out of range for {n_classes} predicted classes")]
    UnknownClass {
        /// The selected class index.
        class: usize,
        /// Number of classes the predictor outputs.
        n_classes: usize,
    },

    /// Returned when the table has too few rows for the perturbation method.
    #[error("method {method} needs at least {min} rows, table has {n_rows}")]
    TooFewRows {
        /// The perturbation method.
        method: String,
        /// Rows in the feature table.
        n_rows: usize,
        /// Minimum rows the method needs.
        min: usize,
    },

    /// Returned when a run would allocate more perturbed rows than allowed.
    #[error("perturbed batch of {rows} rows exceeds the limit of {limit}")]
    BatchTooLarge {
        /// Rows the run would allocate.
        rows: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Returned when the predictor returns a different number of rows than it was given.
    #[error("predictor returned {got} rows for an input of {expected} rows")]
    PredictionLength {
        /// Rows passed to the predictor.
        expected: usize,
        /// Rows returned.
        got: usize,
    },

    /// Wraps a predictor failure unchanged.
    #[error("prediction failed")]
    Prediction {
        /// The predictor's own error.
        #[source]
        source: BoxError,
    },
}
