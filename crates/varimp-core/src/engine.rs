//! The importance engine: baseline, batched perturbation, aggregation.

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::chart::ImportanceChart;
use crate::config::{ImportanceConfig, ZeroBaseline};
use crate::error::ImportanceError;
use crate::loss::Loss;
use crate::perturb::{Method, perturb_all};
use crate::predict::{PredictionOutput, Predictor, Projection, Projector};
use crate::result::{FeatureImportance, Importances, importance_ratio};
use crate::table::{FeatureTable, Target};

/// Perturbed batches above this many rows are logged as a warning.
const LARGE_BATCH_ROWS: usize = 1_000_000;

/// Permutation importance engine over one model, table, and target.
///
/// Construction computes the baseline error; the first call to
/// [`run`](Self::run), [`data`](Self::data) or [`plot`](Self::plot) computes
/// and caches per-feature importances. Later calls reuse the cache.
pub struct ImportanceEngine<'a, P: Predictor + ?Sized> {
    predictor: &'a P,
    table: &'a FeatureTable,
    config: ImportanceConfig,
    projector: Projector,
    actual: Projection,
    baseline_error: f64,
    results: Option<Importances>,
}

impl<'a, P: Predictor + ?Sized> ImportanceEngine<'a, P> {
    /// Validate inputs and compute the baseline error.
    #[instrument(skip_all, fields(
        method = %config.method,
        loss = config.loss.label(),
        n_rows = table.n_rows(),
        n_features = table.n_features(),
    ))]
    pub(crate) fn new(
        predictor: &'a P,
        table: &'a FeatureTable,
        target: &Target,
        config: ImportanceConfig,
    ) -> Result<Self, ImportanceError> {
        // --- Validate inputs ---
        if target.len() != table.n_rows() {
            return Err(ImportanceError::InvalidTarget {
                expected: table.n_rows(),
                got: target.len(),
            });
        }
        let method = config.method;
        if table.n_rows() < method.min_rows() {
            return Err(ImportanceError::TooFewRows {
                method: method.to_string(),
                n_rows: table.n_rows(),
                min: method.min_rows(),
            });
        }
        let batch_rows = method.batch_rows(table.n_rows(), table.n_features());
        if let Some(limit) = config.max_batch_rows
            && batch_rows > limit
        {
            return Err(ImportanceError::BatchTooLarge {
                rows: batch_rows,
                limit,
            });
        }
        if batch_rows > LARGE_BATCH_ROWS {
            warn!(batch_rows, "large perturbed batch; memory grows with features * rows^2 for cartesian");
        }

        // --- Baseline ---
        let label = config.loss.label();
        let projector = Projector::new(config.loss.input(), config.class);
        let actual = projector.project_target(target, label)?;
        let output = predict_checked(predictor, table)?;
        let predicted = projector.project_output(output, label)?;
        let baseline_error = config.loss.evaluate(&actual, &predicted)?;

        if baseline_error == 0.0 {
            match config.zero_baseline {
                ZeroBaseline::Reject => {
                    return Err(ImportanceError::DegenerateBaseline {
                        metric: label.to_string(),
                    });
                }
                ZeroBaseline::Convention => {
                    warn!("baseline error is zero; importances will be inf or 1.0");
                }
            }
        }
        info!(baseline_error, batch_rows, "baseline computed");

        Ok(Self {
            predictor,
            table,
            config,
            projector,
            actual,
            baseline_error,
            results: None,
        })
    }

    /// Compute importances if not already done, and return them.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ImportanceError::Prediction`] | the predictor fails on the perturbed batch |
    /// | [`ImportanceError::PredictionLength`] | the predictor returns the wrong number of rows |
    /// | [`ImportanceError::InvalidMetricShape`] | the loss rejects a feature's rows |
    pub fn run(&mut self) -> Result<&Importances, ImportanceError> {
        let results = match self.results.take() {
            Some(results) => results,
            None => self.compute()?,
        };
        Ok(&*self.results.insert(results))
    }

    /// Return per-feature records sorted by descending importance, running first if needed.
    ///
    /// # Errors
    ///
    /// Same as [`ImportanceEngine::run`].
    pub fn data(&mut self) -> Result<&[FeatureImportance], ImportanceError> {
        Ok(self.run()?.features())
    }

    /// Return chart data for the importances, running first if needed.
    ///
    /// With `sort`, bars are ascending by importance; otherwise they follow
    /// the table's column order.
    ///
    /// # Errors
    ///
    /// Same as [`ImportanceEngine::run`].
    pub fn plot(&mut self, sort: bool) -> Result<ImportanceChart, ImportanceError> {
        let table = self.table;
        let importances = self.run()?;
        Ok(ImportanceChart::new(importances, table.feature_names(), sort))
    }

    /// Return cached results, or `None` before the first run.
    #[must_use]
    pub fn results(&self) -> Option<&Importances> {
        self.results.as_ref()
    }

    /// Return true once importances have been computed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.results.is_some()
    }

    /// Return the baseline (unperturbed) error.
    #[must_use]
    pub fn baseline_error(&self) -> f64 {
        self.baseline_error
    }

    /// Return the resolved loss.
    #[must_use]
    pub fn loss(&self) -> &Loss {
        &self.config.loss
    }

    /// Return the perturbation method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.config.method
    }

    /// Return the projector shared by the baseline and perturbed predictions.
    #[must_use]
    pub fn projector(&self) -> Projector {
        self.projector
    }

    /// Return the number of perturbed rows a run predicts in one batch.
    #[must_use]
    pub fn batch_rows(&self) -> usize {
        self.config
            .method
            .batch_rows(self.table.n_rows(), self.table.n_features())
    }

    #[instrument(skip_all, fields(method = %self.config.method, n_features = self.table.n_features()))]
    fn compute(&self) -> Result<Importances, ImportanceError> {
        let table = self.table;
        let method = self.config.method;
        let seed = self.config.seed;
        let n_features = table.n_features();

        let combined = perturb_all(method, table, seed);
        debug!(rows = combined.n_rows(), "perturbed batch built");

        let output = predict_checked(self.predictor, combined.table())?;
        let label = self.config.loss.label();
        let predicted = self.projector.project_output(output, label)?;

        let groups = combined.group_by_feature(n_features);
        let origin_rows = combined.origin_rows();
        let names = table.feature_names();
        let (actual, loss, baseline_error) = (&self.actual, &self.config.loss, self.baseline_error);
        let features: Vec<FeatureImportance> = groups
            .par_iter()
            .enumerate()
            .map(|(feature, rows)| {
                let origins: Vec<usize> = rows.iter().map(|&r| origin_rows[r]).collect();
                let error = loss.evaluate(&actual.gather(&origins), &predicted.gather(rows))?;
                let importance = importance_ratio(error, baseline_error);
                debug!(feature = %names[feature], error, importance, "feature scored");
                Ok(FeatureImportance {
                    feature: names[feature].clone(),
                    error,
                    importance,
                })
            })
            .collect::<Result<_, ImportanceError>>()?;

        info!(n_features, "importances computed");
        Ok(Importances::new(
            self.baseline_error,
            method,
            label.to_string(),
            features,
        ))
    }
}

impl<P: Predictor + ?Sized> std::fmt::Debug for ImportanceEngine<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportanceEngine")
            .field("method", &self.config.method)
            .field("loss", &self.config.loss)
            .field("baseline_error", &self.baseline_error)
            .field("completed", &self.results.is_some())
            .finish_non_exhaustive()
    }
}

/// Call the predictor once and check it returned one row per input row.
fn predict_checked<P: Predictor + ?Sized>(
    predictor: &P,
    table: &FeatureTable,
) -> Result<PredictionOutput, ImportanceError> {
    let output = predictor
        .predict(table)
        .map_err(|source| ImportanceError::Prediction { source })?;
    if output.len() != table.n_rows() {
        return Err(ImportanceError::PredictionLength {
            expected: table.n_rows(),
            got: output.len(),
        });
    }
    Ok(output)
}

/// Compute permutation importances of `model` on `(x, y)` and return the completed engine.
///
/// # Errors
///
/// Any error from [`ImportanceConfig::build`] or [`ImportanceEngine::run`].
pub fn compute_importance<'a, P>(
    model: &'a P,
    x: &'a FeatureTable,
    y: &Target,
    config: &ImportanceConfig,
) -> Result<ImportanceEngine<'a, P>, ImportanceError>
where
    P: Predictor + ?Sized,
{
    config.compute(model, x, y)
}
