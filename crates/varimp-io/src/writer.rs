//! JSON result writer for importance runs.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};
use varimp_core::{FeatureImportance, ImportanceChart, Importances, Method};

use crate::IoError;
use crate::domain::ExperimentName;

/// Writes importance results and chart data to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_importance.json` and
/// `{experiment}_chart.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Return the path of `{experiment}_importance.json`.
    #[must_use]
    pub fn importance_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_importance.json", self.experiment.as_str()))
    }

    /// Return the path of `{experiment}_chart.json`.
    #[must_use]
    pub fn chart_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_chart.json", self.experiment.as_str()))
    }

    /// Write importance records to `{experiment}_importance.json`.
    ///
    /// Records keep their descending-importance order. Infinite importances
    /// are written as the string `"inf"`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | file write failed |
    #[instrument(skip_all)]
    pub fn write_importance(&self, importances: &Importances) -> Result<PathBuf, IoError> {
        let artifact = ImportanceArtifact {
            experiment: self.experiment.as_str(),
            method: importances.method(),
            loss: importances.loss(),
            baseline_error: importances.baseline_error(),
            n_features: importances.len(),
            features: importances.features(),
        };
        let path = self.importance_path();
        write_json(&path, &artifact)?;
        info!(path = %path.display(), "importance result written");
        Ok(path)
    }

    /// Write chart data to `{experiment}_chart.json`.
    ///
    /// # Errors
    ///
    /// Same as [`ResultWriter::write_importance`].
    #[instrument(skip_all)]
    pub fn write_chart(&self, chart: &ImportanceChart) -> Result<PathBuf, IoError> {
        let artifact = ChartArtifact {
            experiment: self.experiment.as_str(),
            chart,
        };
        let path = self.chart_path();
        write_json(&path, &artifact)?;
        info!(path = %path.display(), bars = chart.bars.len(), "chart written");
        Ok(path)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| IoError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, &json).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct ImportanceArtifact<'a> {
    experiment: &'a str,
    method: Method,
    loss: &'a str,
    baseline_error: f64,
    n_features: usize,
    features: &'a [FeatureImportance],
}

#[derive(Serialize)]
struct ChartArtifact<'a> {
    experiment: &'a str,
    #[serde(flatten)]
    chart: &'a ImportanceChart,
}
