use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use varimp_core::{ImportanceConfig, LossInput, Method, ZeroBaseline, registered};
use varimp_io::{DatasetReader, ExperimentName, ModelFile, ResultWriter};

#[derive(Parser)]
#[command(name = "varimp")]
#[command(about = "Model-agnostic permutation feature importance")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Compute permutation importance of every feature for a model on a dataset
    Compute {
        /// Path to the input CSV file (header row, numeric columns)
        #[arg(long)]
        data: PathBuf,

        /// Name of the target column in the CSV
        #[arg(long)]
        target: String,

        /// Path to the model JSON file
        #[arg(long)]
        model: PathBuf,

        /// Loss name (see `varimp metrics`)
        #[arg(long, default_value = "mse")]
        loss: String,

        /// Perturbation method: "shuffle" or "cartesian"
        #[arg(long, default_value = "shuffle")]
        method: String,

        /// Score one class's probability only (classification models)
        #[arg(long)]
        class: Option<usize>,

        /// Read the target column as integer class labels
        #[arg(long, default_value_t = false)]
        labels: bool,

        /// Columns to drop before scoring (comma-separated, e.g. row ids)
        #[arg(long, value_delimiter = ',')]
        ignore: Vec<String>,

        /// Fail instead of reporting inf when the baseline error is zero
        #[arg(long, default_value_t = false)]
        reject_zero_baseline: bool,

        /// Refuse runs that would predict more perturbed rows than this
        #[arg(long)]
        max_batch_rows: Option<usize>,

        /// Print a text chart to stderr
        #[arg(long, default_value_t = false)]
        chart: bool,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// List registered loss names and the input each expects
    Metrics,
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct ComputeOutput {
    experiment: String,
    n_rows: usize,
    n_features: usize,
    method: Method,
    loss: String,
    baseline_error: f64,
    batch_rows: usize,
    top_feature: Option<String>,
    importance_file: PathBuf,
    chart_file: PathBuf,
}

#[derive(Serialize)]
struct MetricOutput {
    name: &'static str,
    input: LossInput,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Compute {
            data,
            target,
            model,
            loss,
            method,
            class,
            labels,
            ignore,
            reject_zero_baseline,
            max_batch_rows,
            chart,
            experiment,
            output_dir,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;
            let method: Method = method.parse()?;
            let zero_baseline = if reject_zero_baseline {
                ZeroBaseline::Reject
            } else {
                ZeroBaseline::Convention
            };

            // Read dataset and model
            let dataset = DatasetReader::new(&data, target)
                .with_labels(labels)
                .with_ignored_columns(ignore)
                .read()
                .context("failed to read input CSV")?;
            let model = ModelFile::load(&model).context("failed to load model")?;
            model
                .check_features(dataset.table())
                .context("model does not match dataset")?;

            // Build and run the engine
            let config = ImportanceConfig::new(loss.as_str())?
                .with_method(method)
                .with_class(class)
                .with_seed(cli.seed)
                .with_zero_baseline(zero_baseline)
                .with_max_batch_rows(max_batch_rows);
            let mut engine = config
                .compute(&model, dataset.table(), dataset.target())
                .context("importance computation failed")?;
            let plot = engine.plot(true)?;
            let batch_rows = engine.batch_rows();
            let importances = engine.run()?;

            // Write JSON artifacts
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            let importance_file = writer.write_importance(importances)?;
            let chart_file = writer.write_chart(&plot)?;

            if chart {
                eprint!("{plot}");
            }

            // Build and print stdout summary
            let output = ComputeOutput {
                experiment,
                n_rows: dataset.table().n_rows(),
                n_features: dataset.table().n_features(),
                method,
                loss: importances.loss().to_string(),
                baseline_error: importances.baseline_error(),
                batch_rows,
                top_feature: importances.features().first().map(|f| f.feature.clone()),
                importance_file,
                chart_file,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Metrics => {
            let output: Vec<MetricOutput> = registered()
                .into_iter()
                .map(|(name, input)| MetricOutput { name, input })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
