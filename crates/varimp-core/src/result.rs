//! Importance result types.

use serde::{Serialize, Serializer};

use crate::perturb::Method;

/// Importance of a single feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    /// Feature name.
    pub feature: String,
    /// Loss measured with this feature perturbed.
    pub error: f64,
    /// `error / baseline_error`; `1.0` means perturbing the feature changed nothing.
    #[serde(serialize_with = "serialize_ratio")]
    pub importance: f64,
}

/// Ratio of perturbed error to baseline error.
///
/// A zero baseline yields `+inf` when `error` is nonzero and `1.0` when it is
/// also zero. The engine only passes finite losses, so the result is never NaN.
#[must_use]
pub fn importance_ratio(error: f64, baseline_error: f64) -> f64 {
    if baseline_error == 0.0 {
        if error == 0.0 { 1.0 } else { f64::INFINITY }
    } else {
        error / baseline_error
    }
}

/// JSON has no infinity; write it as the string `"inf"`.
fn serialize_ratio<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_infinite() {
        serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Completed importance run: one record per feature, sorted by importance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Importances {
    baseline_error: f64,
    method: Method,
    loss: String,
    features: Vec<FeatureImportance>,
}

impl Importances {
    /// Sort `features` (given in table column order) by descending importance.
    ///
    /// The sort is stable, so ties keep their column order.
    pub(crate) fn new(
        baseline_error: f64,
        method: Method,
        loss: String,
        mut features: Vec<FeatureImportance>,
    ) -> Self {
        features.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        Self {
            baseline_error,
            method,
            loss,
            features,
        }
    }

    /// Return the baseline (unperturbed) error.
    #[must_use]
    pub fn baseline_error(&self) -> f64 {
        self.baseline_error
    }

    /// Return the perturbation method used.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Return the loss label.
    #[must_use]
    pub fn loss(&self) -> &str {
        &self.loss
    }

    /// Return the records sorted by descending importance.
    #[must_use]
    pub fn features(&self) -> &[FeatureImportance] {
        &self.features
    }

    /// Look up one feature's record.
    #[must_use]
    pub fn get(&self, feature: &str) -> Option<&FeatureImportance> {
        self.features.iter().find(|f| f.feature == feature)
    }

    /// Return the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Return true if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
