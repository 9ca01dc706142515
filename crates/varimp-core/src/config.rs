//! Configuration builder for importance runs.

use crate::engine::ImportanceEngine;
use crate::error::ImportanceError;
use crate::loss::{Loss, LossSpec};
use crate::perturb::Method;
use crate::predict::Predictor;
use crate::table::{FeatureTable, Target};

/// What to do when the baseline error is exactly zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZeroBaseline {
    /// Report `+inf` for features whose perturbed error is nonzero and `1.0`
    /// for features whose perturbed error is also zero.
    #[default]
    Convention,
    /// Fail construction with [`ImportanceError::DegenerateBaseline`].
    Reject,
}

/// Configuration for a permutation importance run.
///
/// Construct via [`ImportanceConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter        | Default      |
/// |------------------|--------------|
/// | `method`         | `Shuffle`    |
/// | `class`          | `None`       |
/// | `seed`           | 42           |
/// | `zero_baseline`  | `Convention` |
/// | `max_batch_rows` | `None`       |
#[derive(Debug, Clone)]
pub struct ImportanceConfig {
    pub(crate) loss: Loss,
    pub(crate) method: Method,
    pub(crate) class: Option<usize>,
    pub(crate) seed: u64,
    pub(crate) zero_baseline: ZeroBaseline,
    pub(crate) max_batch_rows: Option<usize>,
}

impl ImportanceConfig {
    /// Create a new config, resolving the loss immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ImportanceError::UnknownMetric`] if a named loss is not registered.
    pub fn new(loss: impl Into<LossSpec>) -> Result<Self, ImportanceError> {
        let loss = loss.into().resolve()?;
        Ok(Self {
            loss,
            method: Method::Shuffle,
            class: None,
            seed: 42,
            zero_baseline: ZeroBaseline::Convention,
            max_batch_rows: None,
        })
    }

    // --- Setters ---

    /// Set the perturbation method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Narrow probability outputs to one class before applying the loss.
    #[must_use]
    pub fn with_class(mut self, class: Option<usize>) -> Self {
        self.class = class;
        self
    }

    /// Set the random seed for shuffle permutations.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the zero-baseline policy.
    #[must_use]
    pub fn with_zero_baseline(mut self, zero_baseline: ZeroBaseline) -> Self {
        self.zero_baseline = zero_baseline;
        self
    }

    /// Cap the number of perturbed rows a run may allocate. `None` means unlimited.
    #[must_use]
    pub fn with_max_batch_rows(mut self, max_batch_rows: Option<usize>) -> Self {
        self.max_batch_rows = max_batch_rows;
        self
    }

    // --- Getters ---

    /// Return the resolved loss.
    #[must_use]
    pub fn loss(&self) -> &Loss {
        &self.loss
    }

    /// Return the perturbation method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Return the selected class, if any.
    #[must_use]
    pub fn class(&self) -> Option<usize> {
        self.class
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the zero-baseline policy.
    #[must_use]
    pub fn zero_baseline(&self) -> ZeroBaseline {
        self.zero_baseline
    }

    /// Return the perturbed-row cap, if any.
    #[must_use]
    pub fn max_batch_rows(&self) -> Option<usize> {
        self.max_batch_rows
    }

    /// Validate inputs and compute the baseline error, without running.
    ///
    /// # Errors
    ///
    /// | Variant                                   | When                                                |
    /// |-------------------------------------------|-----------------------------------------------------|
    /// | [`ImportanceError::InvalidTarget`]        | `target.len() != table.n_rows()`                    |
    /// | [`ImportanceError::TooFewRows`]           | cartesian on a single-row table                     |
    /// | [`ImportanceError::BatchTooLarge`]        | the run would exceed `max_batch_rows`               |
    /// | [`ImportanceError::InvalidMetricShape`]   | target or output cannot feed the loss               |
    /// | [`ImportanceError::UnknownClass`]         | selected class is not a predicted class             |
    /// | [`ImportanceError::DegenerateBaseline`]   | zero baseline with [`ZeroBaseline::Reject`]         |
    /// | [`ImportanceError::PredictionLength`]     | predictor returns the wrong number of rows          |
    /// | [`ImportanceError::Prediction`]           | the predictor fails                                 |
    pub fn build<'a, P>(
        &self,
        predictor: &'a P,
        table: &'a FeatureTable,
        target: &Target,
    ) -> Result<ImportanceEngine<'a, P>, ImportanceError>
    where
        P: Predictor + ?Sized,
    {
        ImportanceEngine::new(predictor, table, target, self.clone())
    }

    /// Build the engine and run it.
    ///
    /// # Errors
    ///
    /// Any error from [`ImportanceConfig::build`] or [`ImportanceEngine::run`].
    pub fn compute<'a, P>(
        &self,
        predictor: &'a P,
        table: &'a FeatureTable,
        target: &Target,
    ) -> Result<ImportanceEngine<'a, P>, ImportanceError>
    where
        P: Predictor + ?Sized,
    {
        let mut engine = self.build(predictor, table, target)?;
        engine.run()?;
        Ok(engine)
    }
}
