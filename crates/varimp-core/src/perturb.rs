//! Perturbation strategies: shuffle and cartesian.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::error::ImportanceError;
use crate::table::FeatureTable;

/// How one feature's values are decorrelated from the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// One random permutation of the feature column per feature. `n` rows.
    #[default]
    Shuffle,
    /// Every row paired with every other row's feature value. `n * (n - 1)` rows.
    Cartesian,
}

impl Method {
    /// Return the number of perturbed rows produced for one feature.
    #[must_use]
    pub fn rows_per_feature(self, n_rows: usize) -> usize {
        match self {
            Self::Shuffle => n_rows,
            Self::Cartesian => n_rows.saturating_mul(n_rows.saturating_sub(1)),
        }
    }

    /// Return the number of perturbed rows a full run allocates.
    ///
    /// For [`Method::Cartesian`] this grows as `n_features * n_rows^2`. The
    /// stacked batch from [`perturb_all`] is built in place, so this is also
    /// the peak row count held at once.
    #[must_use]
    pub fn batch_rows(self, n_rows: usize, n_features: usize) -> usize {
        self.rows_per_feature(n_rows).saturating_mul(n_features)
    }

    /// Return the minimum table size for which the method perturbs anything.
    #[must_use]
    pub fn min_rows(self) -> usize {
        match self {
            Self::Shuffle => 1,
            Self::Cartesian => 2,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shuffle => "shuffle",
            Self::Cartesian => "cartesian",
        })
    }
}

impl FromStr for Method {
    type Err = ImportanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shuffle" => Ok(Self::Shuffle),
            "cartesian" => Ok(Self::Cartesian),
            _ => Err(ImportanceError::UnsupportedMethod {
                method: s.to_string(),
            }),
        }
    }
}

/// Perturbed rows for one or more features.
///
/// `source_features()[r]` is the column perturbed to produce row `r` and
/// `origin_rows()[r]` the base-table row it was derived from.
#[derive(Debug, Clone)]
pub struct PerturbedBatch {
    table: FeatureTable,
    source_feature: Vec<usize>,
    origin_row: Vec<usize>,
}

impl PerturbedBatch {
    /// Return the perturbed rows as a table with the base schema.
    #[must_use]
    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    /// Return, per row, the index of the perturbed feature.
    #[must_use]
    pub fn source_features(&self) -> &[usize] {
        &self.source_feature
    }

    /// Return, per row, the base-table row it was derived from.
    #[must_use]
    pub fn origin_rows(&self) -> &[usize] {
        &self.origin_row
    }

    /// Return the number of perturbed rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.origin_row.len()
    }

    /// Return the row indices belonging to each perturbed feature, indexed by feature.
    #[must_use]
    pub fn group_by_feature(&self, n_features: usize) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); n_features];
        for (row, &feature) in self.source_feature.iter().enumerate() {
            groups[feature].push(row);
        }
        groups
    }
}

/// Permute one feature column across all rows, leaving the other columns in place.
///
/// # Panics
///
/// Panics if `feature >= base.n_features()`.
pub fn shuffle(base: &FeatureTable, feature: usize, rng: &mut impl Rng) -> PerturbedBatch {
    let n_rows = base.n_rows();
    let columns: Vec<Vec<f64>> = base
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            if idx == feature {
                shuffled(col, rng)
            } else {
                col.clone()
            }
        })
        .collect();

    PerturbedBatch {
        table: FeatureTable::from_parts_unchecked(base.feature_names().to_vec(), columns),
        source_feature: vec![feature; n_rows],
        origin_row: origin_rows(Method::Shuffle, n_rows),
    }
}

/// Pair every row `i` with every other row `j != i`, replacing the feature
/// value of row `i` with that of row `j`.
///
/// Produces `n * (n - 1)` rows ordered by `i`, then `j`. Self-pairs are never
/// generated.
///
/// # Panics
///
/// Panics if `feature >= base.n_features()`.
pub fn cartesian(base: &FeatureTable, feature: usize) -> PerturbedBatch {
    let n_rows = base.n_rows();
    let columns: Vec<Vec<f64>> = base
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let mut out = Vec::with_capacity(Method::Cartesian.rows_per_feature(n_rows));
            if idx == feature {
                extend_donors(&mut out, col);
            } else {
                extend_repeated(&mut out, col);
            }
            out
        })
        .collect();

    PerturbedBatch {
        table: FeatureTable::from_parts_unchecked(base.feature_names().to_vec(), columns),
        source_feature: vec![feature; Method::Cartesian.rows_per_feature(n_rows)],
        origin_row: origin_rows(Method::Cartesian, n_rows),
    }
}

/// Build the perturbed batch for one feature with the given method.
///
/// Shuffle draws from a `ChaCha8Rng` seeded with `seed + feature`, so each
/// feature gets an independent, reproducible permutation regardless of the
/// order in which features are processed.
pub fn perturb(method: Method, base: &FeatureTable, feature: usize, seed: u64) -> PerturbedBatch {
    match method {
        Method::Shuffle => shuffle(base, feature, &mut feature_rng(seed, feature)),
        Method::Cartesian => cartesian(base, feature),
    }
}

/// Build the perturbed rows of every feature as one stacked batch.
///
/// Rows are ordered by feature, then in the order [`perturb`] produces them,
/// so the block for feature `f` equals `perturb(method, base, f, seed)`.
/// Output columns are filled in parallel and written in place, so the batch
/// is the only full-size allocation.
pub fn perturb_all(method: Method, base: &FeatureTable, seed: u64) -> PerturbedBatch {
    let n_rows = base.n_rows();
    let n_features = base.n_features();
    let per_feature = method.rows_per_feature(n_rows);
    let total = method.batch_rows(n_rows, n_features);

    let columns: Vec<Vec<f64>> = base
        .columns()
        .par_iter()
        .enumerate()
        .map(|(column, values)| {
            let mut out = Vec::with_capacity(total);
            for feature in 0..n_features {
                match (method, feature == column) {
                    (Method::Shuffle, true) => {
                        out.extend(shuffled(values, &mut feature_rng(seed, feature)));
                    }
                    (Method::Shuffle, false) => out.extend_from_slice(values),
                    (Method::Cartesian, true) => extend_donors(&mut out, values),
                    (Method::Cartesian, false) => extend_repeated(&mut out, values),
                }
            }
            out
        })
        .collect();

    let origins = origin_rows(method, n_rows);
    let mut source_feature = Vec::with_capacity(total);
    let mut origin_row = Vec::with_capacity(total);
    for feature in 0..n_features {
        source_feature.extend(std::iter::repeat_n(feature, per_feature));
        origin_row.extend_from_slice(&origins);
    }

    PerturbedBatch {
        table: FeatureTable::from_parts_unchecked(base.feature_names().to_vec(), columns),
        source_feature,
        origin_row,
    }
}

fn feature_rng(seed: u64, feature: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed.wrapping_add(feature as u64))
}

fn shuffled(values: &[f64], rng: &mut impl Rng) -> Vec<f64> {
    let mut permuted = values.to_vec();
    permuted.shuffle(rng);
    permuted
}

/// For each row `i`, every other row's value in `j` order.
fn extend_donors(out: &mut Vec<f64>, values: &[f64]) {
    for i in 0..values.len() {
        out.extend(
            values
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &v)| v),
        );
    }
}

/// Each row's own value, once per donor.
fn extend_repeated(out: &mut Vec<f64>, values: &[f64]) {
    let donors = values.len().saturating_sub(1);
    for &v in values {
        out.extend(std::iter::repeat_n(v, donors));
    }
}

fn origin_rows(method: Method, n_rows: usize) -> Vec<usize> {
    match method {
        Method::Shuffle => (0..n_rows).collect(),
        Method::Cartesian => (0..n_rows)
            .flat_map(|i| std::iter::repeat_n(i, n_rows.saturating_sub(1)))
            .collect(),
    }
}
