//! Loss functions and the named metric registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::error::ImportanceError;
use crate::predict::{ProbabilityMatrix, Projection};

const LABEL_MAX_CHARS: usize = 32;
const PROB_EPS: f64 = 1e-15;

/// The argument shape a loss consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossInput {
    /// Real values on both sides.
    Values,
    /// Class labels on both sides.
    Labels,
    /// True class labels vs. predicted class probabilities.
    Probabilities,
}

impl fmt::Display for LossInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Values => "values",
            Self::Labels => "labels",
            Self::Probabilities => "probabilities",
        })
    }
}

type ValuesFn = dyn Fn(&[f64], &[f64]) -> f64 + Send + Sync;
type LabelsFn = dyn Fn(&[usize], &[usize]) -> f64 + Send + Sync;
type ProbabilitiesFn = dyn Fn(&[usize], &ProbabilityMatrix) -> f64 + Send + Sync;

#[derive(Clone)]
enum LossKind {
    Values(Arc<ValuesFn>),
    Labels(Arc<LabelsFn>),
    Probabilities(Arc<ProbabilitiesFn>),
}

/// A resolved loss: `loss(actual, predicted) -> f64`, lower is better.
///
/// Cheap to clone. Carries a short label used in logs and reports.
#[derive(Clone)]
pub struct Loss {
    label: String,
    kind: LossKind,
}

impl Loss {
    /// Wrap a loss over real values, e.g. a regression error.
    pub fn values<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[f64], &[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            label: truncate_label(label.into()),
            kind: LossKind::Values(Arc::new(f)),
        }
    }

    /// Wrap a loss over true and predicted class labels.
    pub fn labels<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[usize], &[usize]) -> f64 + Send + Sync + 'static,
    {
        Self {
            label: truncate_label(label.into()),
            kind: LossKind::Labels(Arc::new(f)),
        }
    }

    /// Wrap a loss over true class labels and predicted class probabilities.
    pub fn probabilities<F>(label: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[usize], &ProbabilityMatrix) -> f64 + Send + Sync + 'static,
    {
        Self {
            label: truncate_label(label.into()),
            kind: LossKind::Probabilities(Arc::new(f)),
        }
    }

    /// Return the loss label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Return the argument shape this loss consumes.
    #[must_use]
    pub fn input(&self) -> LossInput {
        match self.kind {
            LossKind::Values(_) => LossInput::Values,
            LossKind::Labels(_) => LossInput::Labels,
            LossKind::Probabilities(_) => LossInput::Probabilities,
        }
    }

    /// Evaluate the loss on projected actual and predicted rows.
    ///
    /// # Errors
    ///
    /// Returns [`ImportanceError::InvalidMetricShape`] when the arguments do
    /// not match [`Loss::input`], differ in length, are empty, contain a label
    /// outside the probability matrix, or the loss returns NaN or an infinity.
    pub fn evaluate(&self, actual: &Projection, predicted: &Projection) -> Result<f64, ImportanceError> {
        let shape_err = |reason: String| ImportanceError::InvalidMetricShape {
            metric: self.label.clone(),
            reason,
        };
        if actual.len() != predicted.len() {
            return Err(shape_err(format!(
                "{} actual rows vs. {} predicted rows",
                actual.len(),
                predicted.len()
            )));
        }
        if actual.is_empty() {
            return Err(shape_err("no rows to evaluate".to_string()));
        }

        let value = match (&self.kind, actual, predicted) {
            (LossKind::Values(f), Projection::Values(a), Projection::Values(p)) => {
                f(a.as_slice(), p.as_slice())
            }
            (LossKind::Labels(f), Projection::Labels(a), Projection::Labels(p)) => {
                f(a.as_slice(), p.as_slice())
            }
            (LossKind::Probabilities(f), Projection::Labels(a), Projection::Probabilities(p)) => {
                if let Some(&label) = a.iter().find(|&&c| c >= p.n_classes()) {
                    return Err(shape_err(format!(
                        "label {label} outside {} predicted classes",
                        p.n_classes()
                    )));
                }
                f(a.as_slice(), p)
            }
            _ => {
                return Err(shape_err(format!(
                    "expects {} but got {} actual and {} predicted",
                    self.input(),
                    actual.input(),
                    predicted.input()
                )));
            }
        };

        if !value.is_finite() {
            return Err(shape_err(format!("loss returned a non-finite value ({value})")));
        }
        Ok(value)
    }
}

impl fmt::Debug for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loss")
            .field("label", &self.label)
            .field("input", &self.input())
            .finish()
    }
}

fn truncate_label(label: String) -> String {
    if label.chars().count() <= LABEL_MAX_CHARS {
        return label;
    }
    let mut short: String = label.chars().take(LABEL_MAX_CHARS - 3).collect();
    short.push_str("...");
    short
}

/// A loss given either by registry name or as a function.
#[derive(Debug, Clone)]
pub enum LossSpec {
    /// Look the loss up in the metric registry.
    Named(String),
    /// Use this loss directly.
    Function(Loss),
}

impl LossSpec {
    /// Resolve to a concrete loss.
    ///
    /// # Errors
    ///
    /// Returns [`ImportanceError::UnknownMetric`] if a named loss is not registered.
    pub fn resolve(&self) -> Result<Loss, ImportanceError> {
        match self {
            Self::Named(name) => lookup(name),
            Self::Function(loss) => Ok(loss.clone()),
        }
    }
}

impl From<&str> for LossSpec {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for LossSpec {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Loss> for LossSpec {
    fn from(loss: Loss) -> Self {
        Self::Function(loss)
    }
}

/// Alternative spellings accepted by [`lookup`], mapped to canonical names.
const ALIASES: &[(&str, &str)] = &[
    ("mean_absolute_error", "mae"),
    ("mean_squared_error", "mse"),
    ("root_mean_squared_error", "rmse"),
    ("bce", "binary_cross_entropy"),
    ("log_loss", "cross_entropy"),
    ("logloss", "cross_entropy"),
    ("misclassification", "zero_one_loss"),
    ("error_rate", "zero_one_loss"),
];

static REGISTRY: LazyLock<BTreeMap<&'static str, Loss>> = LazyLock::new(|| {
    BTreeMap::from([
        ("mae", Loss::values("mae", mean_absolute_error)),
        ("mse", Loss::values("mse", mean_squared_error)),
        ("rmse", Loss::values("rmse", |a: &[f64], p: &[f64]| {
            mean_squared_error(a, p).sqrt()
        })),
        (
            "binary_cross_entropy",
            Loss::values("binary_cross_entropy", binary_cross_entropy),
        ),
        ("cross_entropy", Loss::probabilities("cross_entropy", cross_entropy)),
        ("zero_one_loss", Loss::labels("zero_one_loss", zero_one_loss)),
    ])
});

/// Look up a registered loss by name.
///
/// Matching ignores ASCII case and treats `-` as `_`; aliases such as
/// `mean_absolute_error` or `log_loss` resolve to their canonical metric.
///
/// # Errors
///
/// Returns [`ImportanceError::UnknownMetric`] if the name is not registered.
pub fn lookup(name: &str) -> Result<Loss, ImportanceError> {
    let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map_or(normalized.as_str(), |&(_, canonical)| canonical);
    REGISTRY
        .get(canonical)
        .cloned()
        .ok_or_else(|| ImportanceError::UnknownMetric {
            name: name.to_string(),
            registered: REGISTRY.keys().copied().collect::<Vec<_>>().join(", "),
        })
}

/// List registered canonical metric names with their input shapes, sorted by name.
#[must_use]
pub fn registered() -> Vec<(&'static str, LossInput)> {
    REGISTRY
        .iter()
        .map(|(name, loss)| (*name, loss.input()))
        .collect()
}

/// Mean absolute error.
#[must_use]
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()))
}

/// Mean squared error.
#[must_use]
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| (a - p) * (a - p)))
}

/// Binary cross-entropy of predicted probabilities against 0/1 truth.
#[must_use]
pub fn binary_cross_entropy(actual: &[f64], predicted: &[f64]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(&y, &p)| {
        let p = p.clamp(PROB_EPS, 1.0 - PROB_EPS);
        -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
    }))
}

/// Multi-class cross-entropy: mean negative log-probability of the true class.
#[must_use]
pub fn cross_entropy(actual: &[usize], predicted: &ProbabilityMatrix) -> f64 {
    mean(actual.iter().enumerate().map(|(row, &class)| {
        -predicted.row(row)[class].clamp(PROB_EPS, 1.0 - PROB_EPS).ln()
    }))
}

/// Fraction of rows whose predicted label differs from the true label.
#[must_use]
pub fn zero_one_loss(actual: &[usize], predicted: &[usize]) -> f64 {
    mean(actual.iter().zip(predicted).map(|(a, p)| if a == p { 0.0 } else { 1.0 }))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_canonical_and_aliases() {
        assert_eq!(lookup("mae").unwrap().label(), "mae");
        assert_eq!(lookup("Mean-Absolute-Error").unwrap().label(), "mae");
        assert_eq!(lookup("log_loss").unwrap().label(), "cross_entropy");
        assert_eq!(lookup("misclassification").unwrap().input(), LossInput::Labels);
    }

    #[test]
    fn lookup_unknown_metric() {
        let err = lookup("r2_score").unwrap_err();
        match err {
            ImportanceError::UnknownMetric { name, registered } => {
                assert_eq!(name, "r2_score");
                assert!(registered.contains("mae"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn registered_lists_every_metric() {
        let names: Vec<&str> = registered().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "binary_cross_entropy",
                "cross_entropy",
                "mae",
                "mse",
                "rmse",
                "zero_one_loss"
            ]
        );
    }

    #[test]
    fn regression_metrics() {
        let a = [1.0, 2.0, 3.0];
        let p = [2.0, 2.0, 5.0];
        assert!((mean_absolute_error(&a, &p) - 1.0).abs() < 1e-12);
        assert!((mean_squared_error(&a, &p) - 5.0 / 3.0).abs() < 1e-12);
        let rmse = lookup("rmse").unwrap();
        let value = rmse
            .evaluate(&Projection::Values(a.to_vec()), &Projection::Values(p.to_vec()))
            .unwrap();
        assert!((value - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn cross_entropy_clips_zero_probability() {
        let p = ProbabilityMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.5, 0.5]]).unwrap();
        let value = cross_entropy(&[1, 0], &p);
        assert!(value.is_finite());
        assert!(value > 10.0);
    }

    #[test]
    fn binary_cross_entropy_perfect_is_near_zero() {
        let value = binary_cross_entropy(&[1.0, 0.0], &[1.0, 0.0]);
        assert!(value >= 0.0 && value < 1e-12);
    }

    #[test]
    fn zero_one_counts_mismatches() {
        assert!((zero_one_loss(&[0, 1, 2, 2], &[0, 1, 1, 0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn evaluate_rejects_shape_mismatch() {
        let mae = lookup("mae").unwrap();
        let err = mae
            .evaluate(&Projection::Labels(vec![1]), &Projection::Labels(vec![1]))
            .unwrap_err();
        assert!(matches!(err, ImportanceError::InvalidMetricShape { .. }));

        let err = mae
            .evaluate(&Projection::Values(vec![1.0, 2.0]), &Projection::Values(vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, ImportanceError::InvalidMetricShape { .. }));
    }

    #[test]
    fn evaluate_rejects_label_outside_classes() {
        let ce = lookup("cross_entropy").unwrap();
        let p = ProbabilityMatrix::from_rows(vec![vec![0.5, 0.5]]).unwrap();
        let err = ce
            .evaluate(&Projection::Labels(vec![3]), &Projection::Probabilities(p))
            .unwrap_err();
        assert!(matches!(err, ImportanceError::InvalidMetricShape { .. }));
    }

    #[test]
    fn evaluate_rejects_non_finite() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let loss = Loss::values("bad", move |_: &[f64], _: &[f64]| bad);
            let err = loss
                .evaluate(&Projection::Values(vec![1.0]), &Projection::Values(vec![1.0]))
                .unwrap_err();
            assert!(matches!(err, ImportanceError::InvalidMetricShape { .. }), "{bad}");
        }
    }

    #[test]
    fn mse_overflow_is_rejected() {
        let mse = lookup("mse").unwrap();
        let err = mse
            .evaluate(&Projection::Values(vec![0.0]), &Projection::Values(vec![f64::MAX]))
            .unwrap_err();
        assert!(matches!(err, ImportanceError::InvalidMetricShape { .. }));
    }

    #[test]
    fn custom_loss_label_is_truncated() {
        let loss = Loss::values(
            "a very long description of a custom loss function",
            mean_absolute_error,
        );
        assert_eq!(loss.label().chars().count(), LABEL_MAX_CHARS);
        assert!(loss.label().ends_with("..."));
    }

    #[test]
    fn spec_resolves_function_directly() {
        let spec = LossSpec::from(Loss::labels("hits", |a: &[usize], p: &[usize]| {
            a.iter().zip(p).filter(|(x, y)| x != y).count() as f64
        }));
        let loss = spec.resolve().unwrap();
        assert_eq!(loss.label(), "hits");
        assert_eq!(loss.input(), LossInput::Labels);
    }
}
