//! End-to-end properties of permutation importance runs.
//!
//! These tests drive the public API with small closure models on
//! deterministic synthetic data and check the invariants every run must
//! hold regardless of model or loss.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use varimp_core::{
    BoxError, FeatureTable, ImportanceConfig, ImportanceError, Method, PredictionOutput,
    Predictor, ProbabilityMatrix, Target, ZeroBaseline, cartesian, compute_importance, perturb_all,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 200-row regression table: `y = 3 * x0 + x1`, feature `x2` is noise.
fn make_regression() -> (FeatureTable, Target) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n = 200;
    let mut columns = vec![Vec::with_capacity(n); 3];
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let x0 = rng.r#gen::<f64>();
        let x1 = rng.r#gen::<f64>();
        let x2 = rng.r#gen::<f64>();
        columns[0].push(x0);
        columns[1].push(x1);
        columns[2].push(x2);
        y.push(3.0 * x0 + x1 + (rng.r#gen::<f64>() - 0.5) * 0.1);
    }
    let names = vec!["x0".into(), "x1".into(), "x2".into()];
    (FeatureTable::new(names, columns).unwrap(), Target::Values(y))
}

fn linear_model(table: &FeatureTable) -> Result<PredictionOutput, BoxError> {
    let x0 = table.column(0);
    let x1 = table.column(1);
    Ok(PredictionOutput::Values(
        x0.iter().zip(x1).map(|(a, b)| 3.0 * a + b).collect(),
    ))
}

/// 3-class probabilities driven by feature 0 only.
fn softmax_model(table: &FeatureTable) -> Result<PredictionOutput, BoxError> {
    let rows = table
        .column(0)
        .iter()
        .map(|&x| {
            let logits = [-(x - 0.0).powi(2), -(x - 3.0).powi(2), -(x - 6.0).powi(2)];
            let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
            let sum: f64 = exps.iter().sum();
            exps.into_iter().map(|e| e / sum).collect()
        })
        .collect();
    ProbabilityMatrix::from_rows(rows)
        .map(PredictionOutput::Probabilities)
        .ok_or_else(|| "empty prediction".into())
}

/// 90-row 3-class table: feature `signal` is `class * 3 + noise`, `noise` is noise.
fn make_classification() -> (FeatureTable, Target) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n = 90;
    let mut signal = Vec::with_capacity(n);
    let mut noise = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let class = i % 3;
        labels.push(class);
        signal.push(class as f64 * 3.0 + rng.r#gen::<f64>() * 0.5);
        noise.push(rng.r#gen::<f64>());
    }
    let table = FeatureTable::new(vec!["signal".into(), "noise".into()], vec![signal, noise]).unwrap();
    (table, Target::Labels(labels))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn echo_model_zero_baseline() {
    let table = FeatureTable::new(
        vec!["a".into(), "b".into()],
        vec![vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]],
    )
    .unwrap();
    let y = Target::Values(vec![1.0, 2.0, 3.0]);
    let echo = |t: &FeatureTable| -> Result<PredictionOutput, BoxError> {
        Ok(PredictionOutput::Values(t.column(0).to_vec()))
    };
    let config = ImportanceConfig::new("mean_absolute_error")
        .unwrap()
        .with_method(Method::Cartesian);
    let mut engine = compute_importance(&echo, &table, &y, &config).unwrap();

    assert_eq!(engine.baseline_error(), 0.0);
    let data = engine.data().unwrap();
    assert_eq!(data[0].feature, "a");
    assert!(data[0].importance.is_infinite() && data[0].importance > 0.0);
    assert_eq!(data[1].feature, "b");
    assert_eq!(data[1].importance, 1.0);
}

#[test]
fn cartesian_single_feature_four_rows() {
    let table = FeatureTable::new(vec!["only".into()], vec![vec![1.0, 2.0, 3.0, 4.0]]).unwrap();
    let batch = cartesian(&table, 0);
    assert_eq!(batch.n_rows(), 12);
    assert_eq!(Method::Cartesian.batch_rows(4, 1), 12);

    // The engine issues the whole batch in one call.
    let seen = AtomicUsize::new(0);
    let model = |t: &FeatureTable| -> Result<PredictionOutput, BoxError> {
        seen.store(t.n_rows(), Ordering::SeqCst);
        Ok(PredictionOutput::Values(t.column(0).to_vec()))
    };
    let y = Target::Values(vec![1.5, 2.0, 3.5, 4.0]);
    let config = ImportanceConfig::new("mse").unwrap().with_method(Method::Cartesian);
    let engine = compute_importance(&model, &table, &y, &config).unwrap();
    assert!(engine.is_completed());
    assert_eq!(seen.load(Ordering::SeqCst), 12);
}

#[test]
fn one_record_per_feature_sorted_descending() {
    let (table, y) = make_regression();
    for method in [Method::Shuffle, Method::Cartesian] {
        let config = ImportanceConfig::new("mse").unwrap().with_method(method);
        let mut engine = compute_importance(&linear_model, &table, &y, &config).unwrap();
        let data = engine.data().unwrap();

        assert_eq!(data.len(), table.n_features());
        for pair in data.windows(2) {
            assert!(pair[0].importance >= pair[1].importance);
        }
        for record in data {
            assert!(record.error >= 0.0);
            assert!(record.importance >= 0.0);
        }
        assert_eq!(data[0].feature, "x0", "{method}: strongest feature first");
        assert_eq!(data[2].feature, "x2", "{method}: ignored feature last");
    }
}

#[test]
fn ignored_feature_has_unit_importance() {
    let (table, y) = make_regression();
    let config = ImportanceConfig::new("mae").unwrap();
    let mut engine = compute_importance(&linear_model, &table, &y, &config).unwrap();
    let baseline = engine.baseline_error();
    let results = engine.run().unwrap();
    let x2 = results.get("x2").unwrap();
    assert!((x2.error - baseline).abs() < 1e-12);
    assert!((x2.importance - 1.0).abs() < 1e-9);
}

#[test]
fn shuffle_deterministic_for_seed() {
    let (table, y) = make_regression();
    let config = ImportanceConfig::new("mse").unwrap().with_seed(7);
    let first = compute_importance(&linear_model, &table, &y, &config)
        .unwrap()
        .data()
        .unwrap()
        .to_vec();
    let second = compute_importance(&linear_model, &table, &y, &config)
        .unwrap()
        .data()
        .unwrap()
        .to_vec();
    assert_eq!(first, second);

    let other = compute_importance(&linear_model, &table, &y, &config.clone().with_seed(8))
        .unwrap()
        .data()
        .unwrap()
        .to_vec();
    assert_ne!(first[0].error, other[0].error, "different seed, different permutation");
}

#[test]
fn repeated_access_is_idempotent() {
    let (table, y) = make_regression();
    let calls = AtomicUsize::new(0);
    let model = |t: &FeatureTable| {
        calls.fetch_add(1, Ordering::SeqCst);
        linear_model(t)
    };
    let config = ImportanceConfig::new("rmse").unwrap().with_method(Method::Cartesian);
    let mut engine = config.build(&model, &table, &y).unwrap();
    let first = engine.data().unwrap().to_vec();
    let second = engine.data().unwrap().to_vec();
    let chart = engine.plot(true).unwrap();

    assert_eq!(first, second);
    assert_eq!(chart.bars.len(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2, "baseline plus one batched run");
}

#[test]
fn classification_with_selected_class() {
    let (table, y) = make_classification();
    let config = ImportanceConfig::new("mse").unwrap().with_class(Some(2));
    let mut engine = compute_importance(&softmax_model, &table, &y, &config).unwrap();
    let data = engine.data().unwrap();
    assert_eq!(data[0].feature, "signal");
    assert!(data[0].importance > 1.0);
    assert!((data[1].importance - 1.0).abs() < 1e-9);
}

#[test]
fn classification_label_and_probability_losses() {
    let (table, y) = make_classification();
    for loss in ["zero_one_loss", "cross_entropy", "log_loss"] {
        let config = ImportanceConfig::new(loss).unwrap();
        let mut engine = compute_importance(&softmax_model, &table, &y, &config).unwrap();
        let results = engine.run().unwrap();
        assert_eq!(results.features()[0].feature, "signal", "{loss}");
    }
}

#[test]
fn custom_loss_callable() {
    let (table, y) = make_regression();
    let max_abs = varimp_core::Loss::values("max_abs_error", |a: &[f64], p: &[f64]| {
        a.iter().zip(p).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
    });
    let config = ImportanceConfig::new(max_abs).unwrap();
    let mut engine = compute_importance(&linear_model, &table, &y, &config).unwrap();
    assert_eq!(engine.loss().label(), "max_abs_error");
    assert_eq!(engine.run().unwrap().loss(), "max_abs_error");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn model_error_propagates_unchanged() {
    let (table, y) = make_regression();
    let broken = |_: &FeatureTable| -> Result<PredictionOutput, BoxError> {
        Err("weights not loaded".into())
    };
    let err = compute_importance(&broken, &table, &y, &ImportanceConfig::new("mse").unwrap())
        .unwrap_err();
    match err {
        ImportanceError::Prediction { source } => assert_eq!(source.to_string(), "weights not loaded"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn mismatched_target_rejected() {
    let (table, _) = make_regression();
    let y = Target::Values(vec![0.0; 10]);
    let err = compute_importance(&linear_model, &table, &y, &ImportanceConfig::new("mse").unwrap())
        .unwrap_err();
    assert!(matches!(err, ImportanceError::InvalidTarget { expected: 200, got: 10 }));
}

#[test]
fn unknown_metric_and_method_rejected() {
    assert!(matches!(
        ImportanceConfig::new("r2").unwrap_err(),
        ImportanceError::UnknownMetric { .. }
    ));
    assert!(matches!(
        "bootstrap".parse::<Method>().unwrap_err(),
        ImportanceError::UnsupportedMethod { .. }
    ));
}

#[test]
fn degenerate_baseline_can_be_rejected() {
    let table = FeatureTable::new(vec!["a".into()], vec![vec![1.0, 2.0]]).unwrap();
    let y = Target::Values(vec![1.0, 2.0]);
    let echo = |t: &FeatureTable| -> Result<PredictionOutput, BoxError> {
        Ok(PredictionOutput::Values(t.column(0).to_vec()))
    };
    let config = ImportanceConfig::new("mae")
        .unwrap()
        .with_zero_baseline(ZeroBaseline::Reject);
    let err = compute_importance(&echo, &table, &y, &config).unwrap_err();
    assert!(matches!(err, ImportanceError::DegenerateBaseline { .. }));
}

#[test]
fn trait_object_predictor() {
    struct Constant(f64);
    impl Predictor for Constant {
        fn predict(&self, table: &FeatureTable) -> Result<PredictionOutput, BoxError> {
            Ok(PredictionOutput::Values(vec![self.0; table.n_rows()]))
        }
    }
    let (table, y) = make_regression();
    let model: Box<dyn Predictor> = Box::new(Constant(2.0));
    let mut engine =
        compute_importance(model.as_ref(), &table, &y, &ImportanceConfig::new("mae").unwrap()).unwrap();
    // A constant model ignores every feature.
    assert!(engine.data().unwrap().iter().all(|r| (r.importance - 1.0).abs() < 1e-12));

    let stacked = perturb_all(Method::Cartesian, &table, 0);
    assert_eq!(stacked.n_rows(), table.n_features() * 200 * 199);
    assert_eq!(stacked.n_rows(), Method::Cartesian.batch_rows(200, table.n_features()));
}
