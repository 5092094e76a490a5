//! Model artifact commands: train, inspect, dummy

use anyhow::{bail, Context, Result};
use carbon_lib::{
    dummy_artifact,
    features::{load_readings, load_table},
    observability::StructuredLogger,
    training::{EstimatorKind, SplitStrategy},
    ArtifactStore, FeatureEngine, FeatureRow, FittedPipelineArtifact, Manifest, Metrics, Trainer,
    TrainingConfig,
};
use colored::Colorize;
use std::path::Path;
use tabled::Tabled;
use tracing::{debug, info, warn};

use crate::output::{
    print_info, print_json, print_metrics, print_success, print_table, print_warning,
    OutputFormat,
};
use crate::EstimatorArg;

/// Training knobs taken from the command line
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    pub estimator: EstimatorArg,
    pub alpha: f64,
    pub train_fraction: f64,
    pub shuffle_seed: Option<u64>,
}

/// Seed of the shuffled split for tables when none is given
const TABLE_SEED: u64 = 42;

impl TrainOptions {
    fn estimator_kind(&self) -> EstimatorKind {
        match self.estimator {
            EstimatorArg::Ridge => EstimatorKind::Ridge { alpha: self.alpha },
            EstimatorArg::Mean => EstimatorKind::Mean,
        }
    }

    fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            split: match self.shuffle_seed {
                Some(seed) => SplitStrategy::Shuffled { seed },
                None => SplitStrategy::Chronological,
            },
            train_fraction: self.train_fraction,
            estimator: self.estimator_kind(),
            ..TrainingConfig::default()
        }
    }

    fn table_config(&self, features: Vec<String>, categorical: Vec<String>) -> TrainingConfig {
        TrainingConfig {
            train_fraction: self.train_fraction,
            estimator: self.estimator_kind(),
            ..TrainingConfig::tabular(
                features,
                categorical,
                self.shuffle_seed.unwrap_or(TABLE_SEED),
            )
        }
    }
}

/// Row for the feature contract table
#[derive(Tabled, serde::Serialize)]
struct FeatureRowView {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Feature")]
    name: String,
}

/// Engineer, train and persist
pub fn train(input: &Path, output: &Path, options: TrainOptions, format: OutputFormat) -> Result<()> {
    let readings = load_readings(input)
        .with_context(|| format!("Failed to read sensor log {}", input.display()))?;

    let engine = FeatureEngine::new();
    let rows = engine.engineer(&readings);
    info!(
        readings = readings.len(),
        rows = rows.len(),
        "Engineered training rows"
    );
    let target = engine.config().target.clone();

    fit_and_save(&rows, &target, options.training_config(), output, format)
}

/// Train on a cross-sectional table: every column except the target is a
/// feature and text columns are one-hot encoded
pub fn train_table(
    input: &Path,
    target: &str,
    output: &Path,
    options: TrainOptions,
    format: OutputFormat,
) -> Result<()> {
    let table =
        load_table(input).with_context(|| format!("Failed to read table {}", input.display()))?;
    if !table.columns.iter().any(|c| c == target) {
        bail!("Target column '{}' not found in {}", target, input.display());
    }

    let total = table.rows.len();
    let rows: Vec<FeatureRow> = table
        .rows
        .into_iter()
        .filter(|row| row.has_column(target))
        .collect();
    if rows.len() < total {
        warn!(
            skipped = total - rows.len(),
            column = target,
            "Skipping table rows without a target value"
        );
    }

    let features: Vec<String> = table
        .columns
        .iter()
        .filter(|c| *c != target)
        .cloned()
        .collect();
    debug!(
        features = features.len(),
        categorical = ?table.categorical,
        "Selected table features"
    );
    let config = options.table_config(features, table.categorical);

    fit_and_save(&rows, target, config, output, format)
}

fn fit_and_save(
    rows: &[FeatureRow],
    target: &str,
    config: TrainingConfig,
    output: &Path,
    format: OutputFormat,
) -> Result<()> {
    let (artifact, metrics) = Trainer::new(config)
        .train(rows, target)
        .context("Training failed")?;

    let manifest = ArtifactStore::new(output)
        .save(&artifact)
        .with_context(|| format!("Failed to save artifact to {}", output.display()))?;
    info!(
        output = %output.display(),
        checksum = %manifest.checksum,
        "Artifact saved"
    );

    report_training(&artifact, &metrics, &manifest, output, format)
}

fn report_training(
    artifact: &FittedPipelineArtifact,
    metrics: &Metrics,
    manifest: &Manifest,
    output: &Path,
    format: OutputFormat,
) -> Result<()> {
    StructuredLogger::new("carbon-cli").log_training_complete(
        &artifact.estimator,
        artifact.schema.len(),
        metrics,
    );

    match format {
        OutputFormat::Json => print_json(manifest)?,
        OutputFormat::Table => {
            print_success(&format!(
                "Trained {} on {} rows ({} train / {} test)",
                manifest.estimator, manifest.rows, manifest.train_rows, manifest.test_rows
            ));
            if manifest.test_rows == 0 {
                print_warning("No held-out rows; metrics are computed on the train split");
            }
            println!();
            print_metrics(metrics);
            println!();
            print_info(&format!("Artifact written to {}", output.display()));
        }
    }
    Ok(())
}

/// Show the manifest of a saved artifact
pub fn inspect(model_dir: &Path, format: OutputFormat) -> Result<()> {
    let manifest = ArtifactStore::new(model_dir)
        .load_manifest()
        .with_context(|| format!("Failed to read manifest in {}", model_dir.display()))?;

    match format {
        OutputFormat::Json => print_json(&manifest)?,
        OutputFormat::Table => print_manifest(&manifest),
    }
    Ok(())
}

fn print_manifest(manifest: &Manifest) {
    println!("{}", "Model Artifact".bold());
    println!("{}", "=".repeat(40));
    println!("Estimator:              {}", manifest.estimator.cyan());
    println!("Target:                 {}", manifest.target);
    println!("Schema version:         {}", manifest.schema_version);
    println!("Trained at:             {}", manifest.trained_at.to_rfc3339());
    println!(
        "Rows:                   {} ({} train / {} test)",
        manifest.rows, manifest.train_rows, manifest.test_rows
    );
    println!("Checksum:               {}", manifest.checksum);
    println!();
    print_metrics(&manifest.metrics);
    println!();

    let features: Vec<FeatureRowView> = manifest
        .features
        .iter()
        .enumerate()
        .map(|(position, name)| FeatureRowView {
            position,
            name: name.clone(),
        })
        .collect();
    print_table(&features, OutputFormat::Table);
}

/// Write the emission-factor artifact
pub fn dummy(output: &Path, format: OutputFormat) -> Result<()> {
    let artifact = dummy_artifact().context("Failed to build emission-factor artifact")?;
    let manifest = ArtifactStore::new(output)
        .save(&artifact)
        .with_context(|| format!("Failed to save artifact to {}", output.display()))?;

    match format {
        OutputFormat::Json => print_json(&manifest)?,
        OutputFormat::Table => print_success(&format!(
            "Wrote emission-factor artifact with {} features to {}",
            manifest.features.len(),
            output.display()
        )),
    }
    Ok(())
}
