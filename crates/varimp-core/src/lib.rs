//! Model-agnostic permutation feature importance.
//!
//! Measures how much a trained model's loss grows when one feature's values
//! are decorrelated from the target, either by shuffling the column or by
//! pairing every row with every other row's value. All features are
//! perturbed into one stacked batch and scored with a single prediction
//! call; the per-feature error is reported relative to the baseline error.

mod chart;
mod config;
mod engine;
mod error;
mod loss;
mod perturb;
mod predict;
mod result;
mod table;

pub use chart::ImportanceChart;
pub use config::{ImportanceConfig, ZeroBaseline};
pub use engine::{ImportanceEngine, compute_importance};
pub use error::{BoxError, ImportanceError};
pub use loss::{
    Loss, LossInput, LossSpec, binary_cross_entropy, cross_entropy, lookup, mean_absolute_error,
    mean_squared_error, registered, zero_one_loss,
};
pub use perturb::{Method, PerturbedBatch, cartesian, perturb, perturb_all, shuffle};
pub use predict::{PredictionOutput, Predictor, ProbabilityMatrix, Projection, Projector};
pub use result::{FeatureImportance, Importances, importance_ratio};
pub use table::{FeatureTable, Target};
