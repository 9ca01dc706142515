//! Prediction adapter: the model interface and the shared output projection.

use crate::error::{BoxError, ImportanceError};
use crate::loss::LossInput;
use crate::table::{FeatureTable, Target};

/// A trained model that scores every row of a feature table.
///
/// Implementations receive tables with the same schema as the table the
/// engine was built with, including perturbed batches, and must return one
/// output row per input row. Model-specific prediction options belong to the
/// implementing type.
pub trait Predictor {
    /// Score all rows of `table`.
    ///
    /// # Errors
    ///
    /// Any error is propagated to the caller unchanged, wrapped in
    /// [`ImportanceError::Prediction`].
    fn predict(&self, table: &FeatureTable) -> Result<PredictionOutput, BoxError>;
}

impl<F> Predictor for F
where
    F: Fn(&FeatureTable) -> Result<PredictionOutput, BoxError>,
{
    fn predict(&self, table: &FeatureTable) -> Result<PredictionOutput, BoxError> {
        self(table)
    }
}

/// Row-major class probabilities: one row of `n_classes` values per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMatrix {
    n_classes: usize,
    data: Vec<f64>,
}

impl ProbabilityMatrix {
    /// Wrap a flat row-major buffer. Returns `None` if `n_classes` is zero or
    /// does not divide `data.len()`.
    #[must_use]
    pub fn new(n_classes: usize, data: Vec<f64>) -> Option<Self> {
        if n_classes == 0 || data.len() % n_classes != 0 {
            return None;
        }
        Some(Self { n_classes, data })
    }

    /// Build from per-row probability vectors. Returns `None` if the rows are
    /// empty or have differing lengths.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let n_classes = rows.first()?.len();
        if rows.iter().any(|r| r.len() != n_classes) {
            return None;
        }
        Self::new(n_classes, rows.into_iter().flatten().collect())
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.data.len() / self.n_classes
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the probability vector of one row.
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.n_classes..(index + 1) * self.n_classes]
    }

    /// Return one class's probability for every row.
    #[must_use]
    pub fn column(&self, class: usize) -> Vec<f64> {
        self.data
            .chunks_exact(self.n_classes)
            .map(|row| row[class])
            .collect()
    }

    /// Return the most probable class per row (lowest index wins ties).
    #[must_use]
    pub fn argmax(&self) -> Vec<usize> {
        self.data
            .chunks_exact(self.n_classes)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (idx, &p)| {
                        if p > best.1 { (idx, p) } else { best }
                    })
                    .0
            })
            .collect()
    }
}

/// Raw model output for a table, one entry per row.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutput {
    /// Regression values (or scores).
    Values(Vec<f64>),
    /// Predicted class labels.
    Labels(Vec<usize>),
    /// Per-class probabilities.
    Probabilities(ProbabilityMatrix),
}

impl PredictionOutput {
    /// Return the number of predicted rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Values(v) => v.len(),
            Self::Labels(l) => l.len(),
            Self::Probabilities(p) => p.n_rows(),
        }
    }

    /// Return true if no rows were predicted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A target or prediction reduced to the representation a loss consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Real values.
    Values(Vec<f64>),
    /// Class labels.
    Labels(Vec<usize>),
    /// Class probabilities.
    Probabilities(ProbabilityMatrix),
}

impl Projection {
    /// Return the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Values(v) => v.len(),
            Self::Labels(l) => l.len(),
            Self::Probabilities(p) => p.n_rows(),
        }
    }

    /// Return true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the shape of this projection.
    #[must_use]
    pub fn input(&self) -> LossInput {
        match self {
            Self::Values(_) => LossInput::Values,
            Self::Labels(_) => LossInput::Labels,
            Self::Probabilities(_) => LossInput::Probabilities,
        }
    }

    /// Gather rows by index, repeating rows as often as they are listed.
    pub(crate) fn gather(&self, indices: &[usize]) -> Self {
        match self {
            Self::Values(v) => Self::Values(indices.iter().map(|&i| v[i]).collect()),
            Self::Labels(l) => Self::Labels(indices.iter().map(|&i| l[i]).collect()),
            Self::Probabilities(p) => Self::Probabilities(ProbabilityMatrix {
                n_classes: p.n_classes,
                data: indices.iter().flat_map(|&i| p.row(i).iter().copied()).collect(),
            }),
        }
    }
}

/// Reduces targets and model outputs to the shape a loss consumes.
///
/// The same projector is applied to the baseline prediction and to every
/// perturbed batch so that their errors stay comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projector {
    input: LossInput,
    class: Option<usize>,
}

impl Projector {
    /// Create a projector for a loss consuming `input`, optionally narrowed to one class.
    #[must_use]
    pub fn new(input: LossInput, class: Option<usize>) -> Self {
        Self { input, class }
    }

    /// Return the loss input shape this projector produces.
    #[must_use]
    pub fn input(&self) -> LossInput {
        self.input
    }

    /// Return the selected class, if any.
    #[must_use]
    pub fn class(&self) -> Option<usize> {
        self.class
    }

    /// Project the true target into the loss's "actual" argument.
    ///
    /// # Errors
    ///
    /// Returns [`ImportanceError::InvalidMetricShape`] when the target cannot
    /// feed the loss (e.g. a numeric target with a label loss, or a class
    /// selection on a numeric target).
    pub fn project_target(&self, target: &Target, metric: &str) -> Result<Projection, ImportanceError> {
        let shape_err = |reason: &str| ImportanceError::InvalidMetricShape {
            metric: metric.to_string(),
            reason: reason.to_string(),
        };
        match (self.input, self.class, target) {
            (LossInput::Values, None, Target::Values(v)) => Ok(Projection::Values(v.clone())),
            (LossInput::Values, None, Target::Labels(l)) => {
                Ok(Projection::Values(l.iter().map(|&c| c as f64).collect()))
            }
            (LossInput::Values, Some(class), Target::Labels(l)) => Ok(Projection::Values(
                l.iter().map(|&c| if c == class { 1.0 } else { 0.0 }).collect(),
            )),
            (_, Some(_), Target::Values(_)) => {
                Err(shape_err("class selection requires a labels target"))
            }
            (LossInput::Labels | LossInput::Probabilities, None, Target::Labels(l)) => {
                Ok(Projection::Labels(l.clone()))
            }
            (LossInput::Labels | LossInput::Probabilities, None, Target::Values(_)) => {
                Err(shape_err("loss expects class labels but the target is numeric"))
            }
            (LossInput::Labels | LossInput::Probabilities, Some(_), Target::Labels(_)) => {
                Err(shape_err("class selection requires a loss over values"))
            }
        }
    }

    /// Project a model output into the loss's "predicted" argument.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ImportanceError::UnknownClass`] | selected class is not below the output's class count |
    /// | [`ImportanceError::InvalidMetricShape`] | the output cannot be reduced to the loss input |
    pub fn project_output(
        &self,
        output: PredictionOutput,
        metric: &str,
    ) -> Result<Projection, ImportanceError> {
        let shape_err = |reason: &str| ImportanceError::InvalidMetricShape {
            metric: metric.to_string(),
            reason: reason.to_string(),
        };
        match (self.input, self.class, output) {
            (LossInput::Values, None, PredictionOutput::Values(v)) => Ok(Projection::Values(v)),
            (LossInput::Values, None, PredictionOutput::Labels(l)) => {
                Ok(Projection::Values(l.into_iter().map(|c| c as f64).collect()))
            }
            (LossInput::Values, Some(class), PredictionOutput::Probabilities(p)) => {
                if class >= p.n_classes() {
                    return Err(ImportanceError::UnknownClass {
                        class,
                        n_classes: p.n_classes(),
                    });
                }
                Ok(Projection::Values(p.column(class)))
            }
            (LossInput::Values, None, PredictionOutput::Probabilities(p)) => {
                if p.n_classes() == 2 {
                    Ok(Projection::Values(p.column(1)))
                } else {
                    Err(shape_err(
                        "multi-class probabilities need a selected class for a loss over values",
                    ))
                }
            }
            (LossInput::Labels, None, PredictionOutput::Labels(l)) => Ok(Projection::Labels(l)),
            (LossInput::Labels, None, PredictionOutput::Probabilities(p)) => {
                Ok(Projection::Labels(p.argmax()))
            }
            (LossInput::Probabilities, None, PredictionOutput::Probabilities(p)) => {
                Ok(Projection::Probabilities(p))
            }
            (_, Some(_), _) => Err(shape_err(
                "class selection requires probability outputs and a loss over values",
            )),
            (LossInput::Labels, None, PredictionOutput::Values(_)) => {
                Err(shape_err("loss expects labels but the model outputs values"))
            }
            (LossInput::Probabilities, None, _) => {
                Err(shape_err("loss expects class probabilities"))
            }
        }
    }
}
