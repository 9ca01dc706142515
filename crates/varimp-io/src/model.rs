//! JSON-described models that can be scored by the importance engine.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use varimp_core::{BoxError, FeatureTable, PredictionOutput, Predictor, ProbabilityMatrix};

use crate::IoError;

/// Current model file format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for a model file.
#[derive(Serialize, Deserialize)]
struct ModelEnvelope {
    format_version: u32,
    model: ModelFile,
}

/// A model described in JSON.
///
/// ```json
/// { "format_version": 1,
///   "model": { "kind": "linear", "intercept": 0.5, "weights": { "area": 2.0 } } }
/// ```
///
/// Weights are keyed by feature name; features without a weight contribute
/// nothing. Every weighted feature must be a column of the scored table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelFile {
    /// `y = intercept + sum(w_f * x_f)`.
    Linear(LinearModel),
    /// Multinomial logistic regression: one linear score per class, softmax.
    Logistic(LogisticModel),
}

/// Linear regression coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Constant term.
    #[serde(default)]
    pub intercept: f64,
    /// Coefficient per feature name.
    pub weights: BTreeMap<String, f64>,
}

/// Multinomial logistic regression coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    /// One linear score per class, in class-index order. At least two.
    pub classes: Vec<LinearModel>,
    /// What `predict` returns.
    #[serde(default)]
    pub output: ClassifierOutput,
}

/// Prediction option for classifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierOutput {
    /// Per-class probabilities.
    #[default]
    Probabilities,
    /// The most probable class.
    Labels,
}

impl ModelFile {
    /// Load a model from a JSON file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::FileNotFound`] | file read failed |
    /// | [`IoError::ModelParse`] | not a valid model envelope |
    /// | [`IoError::InvalidModel`] | unsupported format version, fewer than two classes, or non-finite weights |
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, IoError> {
        let text = std::fs::read_to_string(path).map_err(|e| IoError::FileNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;
        let envelope: ModelEnvelope =
            serde_json::from_str(&text).map_err(|e| IoError::ModelParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(IoError::InvalidModel {
                reason: format!(
                    "format version {} (expected {FORMAT_VERSION})",
                    envelope.format_version
                ),
            });
        }
        let model = envelope.model;
        model.validate()?;
        info!(kind = model.kind(), n_weights = model.features().len(), "model loaded");
        Ok(model)
    }

    /// Return the model kind as written in the file.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::Logistic(_) => "logistic",
        }
    }

    /// Return the sorted, deduplicated feature names the model reads.
    #[must_use]
    pub fn features(&self) -> Vec<&str> {
        let mut names: Vec<&str> = match self {
            Self::Linear(m) => m.weights.keys().map(String::as_str).collect(),
            Self::Logistic(m) => m
                .classes
                .iter()
                .flat_map(|c| c.weights.keys().map(String::as_str))
                .collect(),
        };
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Check that every weighted feature is a column of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnknownModelFeature`] for the first missing feature.
    pub fn check_features(&self, table: &FeatureTable) -> Result<(), IoError> {
        match self.features().into_iter().find(|f| table.feature_index(f).is_none()) {
            Some(feature) => Err(IoError::UnknownModelFeature {
                feature: feature.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn validate(&self) -> Result<(), IoError> {
        let invalid = |reason: &str| IoError::InvalidModel {
            reason: reason.to_string(),
        };
        let linears: Vec<&LinearModel> = match self {
            Self::Linear(m) => vec![m],
            Self::Logistic(m) => {
                if m.classes.len() < 2 {
                    return Err(invalid("a logistic model needs at least two classes"));
                }
                m.classes.iter().collect()
            }
        };
        let finite = linears
            .iter()
            .all(|m| m.intercept.is_finite() && m.weights.values().all(|w| w.is_finite()));
        if !finite {
            return Err(invalid("intercepts and weights must be finite"));
        }
        Ok(())
    }
}

impl LinearModel {
    fn score(&self, table: &FeatureTable) -> Result<Vec<f64>, IoError> {
        let mut out = vec![self.intercept; table.n_rows()];
        for (feature, &weight) in &self.weights {
            let column = table
                .column_by_name(feature)
                .ok_or_else(|| IoError::UnknownModelFeature {
                    feature: feature.clone(),
                })?;
            for (acc, &x) in out.iter_mut().zip(column) {
                *acc += weight * x;
            }
        }
        Ok(out)
    }
}

impl LogisticModel {
    fn probabilities(&self, table: &FeatureTable) -> Result<ProbabilityMatrix, IoError> {
        let scores: Vec<Vec<f64>> = self
            .classes
            .iter()
            .map(|c| c.score(table))
            .collect::<Result<_, _>>()?;
        let n_classes = scores.len();
        let mut data = Vec::with_capacity(table.n_rows() * n_classes);
        for row in 0..table.n_rows() {
            let max = scores.iter().map(|s| s[row]).fold(f64::NEG_INFINITY, f64::max);
            let start = data.len();
            data.extend(scores.iter().map(|s| (s[row] - max).exp()));
            let sum: f64 = data[start..].iter().sum();
            for p in &mut data[start..] {
                *p /= sum;
            }
        }
        ProbabilityMatrix::new(n_classes, data).ok_or_else(|| IoError::InvalidModel {
            reason: "a logistic model needs at least one class".to_string(),
        })
    }
}

impl Predictor for ModelFile {
    fn predict(&self, table: &FeatureTable) -> Result<PredictionOutput, BoxError> {
        let output = match self {
            Self::Linear(m) => PredictionOutput::Values(m.score(table)?),
            Self::Logistic(m) => {
                let proba = m.probabilities(table)?;
                match m.output {
                    ClassifierOutput::Probabilities => PredictionOutput::Probabilities(proba),
                    ClassifierOutput::Labels => PredictionOutput::Labels(proba.argmax()),
                }
            }
        };
        Ok(output)
    }
}
