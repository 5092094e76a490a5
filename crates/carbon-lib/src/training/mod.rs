//! Training pipeline
//!
//! Turns engineered rows into a [`FittedPipelineArtifact`]:
//! - Feature selection against the canonical column contract, or an
//!   explicit column list for cross-sectional tables
//! - Train/test split (chronological by default)
//! - Preprocessing fitted on the train split only
//! - Pluggable regressor fit and held-out evaluation

mod estimator;
mod metrics;
mod pipeline;
mod preprocess;
mod split;

pub use estimator::{Estimator, FittedModel, LinearModel, MeanRegressor, RidgeRegression};
pub use metrics::{mean_absolute_error, mean_squared_error, r_squared};
pub use pipeline::FittedPipeline;
pub use preprocess::{ColumnEncoding, Preprocessor};
pub use split::{split_indices, SplitStrategy};

use chrono::Utc;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::artifact::FittedPipelineArtifact;
use crate::error::{EstimationError, Result};
use crate::models::{finite_or_zero, FeatureRow, FeatureValue, Metrics, RowCounts};
use crate::schema::{columns, SchemaRegistry};

/// Which regressor the trainer fits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EstimatorKind {
    Ridge { alpha: f64 },
    Mean,
}

impl Default for EstimatorKind {
    fn default() -> Self {
        EstimatorKind::Ridge { alpha: 1.0 }
    }
}

impl EstimatorKind {
    pub fn build(&self) -> Box<dyn Estimator> {
        match *self {
            EstimatorKind::Ridge { alpha } => Box::new(RidgeRegression { alpha }),
            EstimatorKind::Mean => Box::new(MeanRegressor),
        }
    }
}

/// Which columns of the training rows become features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "columns")]
pub enum FeatureSelection {
    /// Canonical sensor fields plus engineered lag and rolling columns
    #[default]
    Engineered,
    /// The listed columns, in order
    Columns(Vec<String>),
}

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub split: SplitStrategy,
    /// Share of rows assigned to the train split (0.0-1.0)
    pub train_fraction: f64,
    pub estimator: EstimatorKind,
    pub features: FeatureSelection,
    /// Feature columns to one-hot encode
    pub categorical: Vec<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            split: SplitStrategy::Chronological,
            train_fraction: 0.8,
            estimator: EstimatorKind::default(),
            features: FeatureSelection::default(),
            categorical: columns::CATEGORICAL.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl TrainingConfig {
    /// Settings for a cross-sectional table: the given feature columns, a
    /// seeded shuffle split and the detected categorical columns
    pub fn tabular(features: Vec<String>, categorical: Vec<String>, seed: u64) -> Self {
        Self {
            split: SplitStrategy::Shuffled { seed },
            features: FeatureSelection::Columns(features),
            categorical,
            ..Self::default()
        }
    }
}

/// Fits preprocessing and a regressor over engineered rows
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit a pipeline predicting `target` and evaluate it on the held-out split
    pub fn train(
        &self,
        rows: &[FeatureRow],
        target: &str,
    ) -> Result<(FittedPipelineArtifact, Metrics)> {
        let started = Instant::now();
        let first = rows.first().ok_or(EstimationError::EmptyDataset)?;
        if let Some(index) = rows.iter().position(|row| !row.has_column(target)) {
            debug!(row = index, column = target, "Training row without a target value");
            return Err(EstimationError::MissingTarget(target.to_string()));
        }

        let features = match &self.config.features {
            FeatureSelection::Engineered => select_features(first, target),
            FeatureSelection::Columns(names) => {
                let absent = names
                    .iter()
                    .find(|name| !rows.iter().any(|row| row.has_column(name)));
                if let Some(name) = absent {
                    return Err(EstimationError::FeatureSchema(format!(
                        "feature column '{}' is absent from the training rows",
                        name
                    )));
                }
                names.iter().filter(|name| *name != target).cloned().collect()
            }
        };
        let categorical = self
            .config
            .categorical
            .iter()
            .filter(|name| features.contains(*name))
            .cloned()
            .collect();
        let schema = SchemaRegistry::new(features, target)?.with_categorical(categorical)?;
        let matrix: Vec<Vec<FeatureValue>> =
            rows.iter().map(|row| schema_row(row, &schema)).collect();
        let y: Vec<f64> = rows
            .iter()
            .map(|row| finite_or_zero(row.number(target).unwrap_or(0.0)))
            .collect();

        let (train_idx, test_idx) =
            split_indices(rows, self.config.split, self.config.train_fraction);
        debug!(
            train_rows = train_idx.len(),
            test_rows = test_idx.len(),
            split = ?self.config.split,
            "Split engineered rows"
        );

        let pick_x = |idx: &[usize]| -> Vec<Vec<FeatureValue>> {
            idx.iter().map(|&i| matrix[i].clone()).collect()
        };
        let pick_y = |idx: &[usize]| -> Vec<f64> { idx.iter().map(|&i| y[i]).collect() };

        let x_train = pick_x(&train_idx);
        let y_train = pick_y(&train_idx);

        let preprocessor = Preprocessor::fit(&schema, &x_train);
        let estimator = self.config.estimator.build();
        let encoded = preprocessor.transform(&x_train)?;
        let model = estimator.fit(&encoded, &Array1::from_vec(y_train.clone()))?;
        let pipeline = FittedPipeline::new(preprocessor, model)?;

        let metrics = if test_idx.is_empty() {
            warn!(
                rows = rows.len(),
                "Test split is empty, reporting metrics on the train split"
            );
            Metrics::evaluate(&y_train, &pipeline.predict(&x_train)?)
        } else {
            let x_test = pick_x(&test_idx);
            Metrics::evaluate(&pick_y(&test_idx), &pipeline.predict(&x_test)?)
        };

        let row_counts = RowCounts {
            rows: rows.len(),
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
        };

        info!(
            estimator = estimator.name(),
            features = schema.len(),
            rows = row_counts.rows,
            train_rows = row_counts.train_rows,
            test_rows = row_counts.test_rows,
            mae = metrics.mae,
            rmse = metrics.rmse,
            r2 = metrics.r2,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Training complete"
        );

        let artifact = FittedPipelineArtifact {
            schema,
            pipeline,
            metrics,
            row_counts,
            estimator: estimator.name().to_string(),
            trained_at: Utc::now(),
        };
        Ok((artifact, metrics))
    }
}

/// Train with the default configuration
pub fn train(rows: &[FeatureRow], target: &str) -> Result<(FittedPipelineArtifact, Metrics)> {
    Trainer::default().train(rows, target)
}

/// Canonical base fields present in the rows, then the engineered columns
fn select_features(row: &FeatureRow, target: &str) -> Vec<String> {
    row.columns()
        .into_iter()
        .filter(|name| name != target)
        .filter(|name| columns::BASE_FEATURES.contains(&name.as_str()) || columns::is_derived(name))
        .collect()
}

/// Schema-ordered values of one row; absent columns default to zero
fn schema_row(row: &FeatureRow, schema: &SchemaRegistry) -> Vec<FeatureValue> {
    schema
        .features()
        .iter()
        .map(|name| match row.get(name) {
            Some(FeatureValue::Number(v)) => FeatureValue::Number(finite_or_zero(*v)),
            Some(value) => value.clone(),
            None => FeatureValue::Number(0.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    /// Rows where the target is an exact linear function of electricity
    fn linear_rows(n: usize) -> Vec<FeatureRow> {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let kwh = 10.0 + (i % 7) as f64 * 5.0;
                let mut values = BTreeMap::new();
                values.insert(
                    columns::ELECTRICITY.to_string(),
                    FeatureValue::Number(kwh),
                );
                values.insert(
                    columns::SHIFT.to_string(),
                    FeatureValue::Category(if i % 2 == 0 { "A" } else { "B" }.to_string()),
                );
                values.insert(
                    columns::derived(columns::ELECTRICITY, "lag1"),
                    FeatureValue::Number(0.0),
                );
                values.insert(
                    columns::TARGET.to_string(),
                    FeatureValue::Number(5.0 + 0.4 * kwh),
                );
                FeatureRow {
                    site_id: "SITE_1".to_string(),
                    timestamp: (start + Duration::minutes(15 * i as i64)).into(),
                    values,
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_dataset() {
        let err = train(&[], columns::TARGET).unwrap_err();
        assert!(matches!(err, EstimationError::EmptyDataset));
    }

    #[test]
    fn test_missing_target() {
        let rows = linear_rows(5);
        let err = train(&rows, "not_a_column").unwrap_err();
        assert!(matches!(err, EstimationError::MissingTarget(name) if name == "not_a_column"));
    }

    #[test]
    fn test_any_row_without_target_is_rejected() {
        let mut rows = linear_rows(6);
        rows[4].values.remove(columns::TARGET);
        let err = train(&rows, columns::TARGET).unwrap_err();
        assert!(matches!(err, EstimationError::MissingTarget(name) if name == columns::TARGET));
    }

    /// Country-level rows: tons = 3·energy + 50 for Steel, + 10 otherwise
    fn sector_rows() -> Vec<FeatureRow> {
        let regions = ["EU", "Asia", "Americas"];
        (0..30)
            .map(|i| {
                let energy = 5.0 + (i % 9) as f64;
                let industry = if i % 3 == 0 { "Steel" } else { "Cement" };
                let offset = if industry == "Steel" { 50.0 } else { 10.0 };
                let mut values = BTreeMap::new();
                values.insert("Industry_Type".to_string(), FeatureValue::Category(industry.into()));
                values.insert("Region".to_string(), FeatureValue::Category(regions[(i / 2) % 3].into()));
                values.insert("Energy_TWh".to_string(), FeatureValue::Number(energy));
                values.insert(
                    "Co2_Emissions_MetricTons".to_string(),
                    FeatureValue::Number(3.0 * energy + offset),
                );
                FeatureRow {
                    site_id: columns::DEFAULT_SITE.to_string(),
                    timestamp: Utc.timestamp_opt(i as i64, 0).unwrap().into(),
                    values,
                }
            })
            .collect()
    }

    #[test]
    fn test_cross_sectional_training() {
        let features = vec![
            "Industry_Type".to_string(),
            "Region".to_string(),
            "Energy_TWh".to_string(),
        ];
        let mut config = TrainingConfig::tabular(
            features,
            vec!["Industry_Type".to_string(), "Region".to_string()],
            42,
        );
        config.estimator = EstimatorKind::Ridge { alpha: 1e-6 };
        let (artifact, metrics) = Trainer::new(config)
            .train(&sector_rows(), "Co2_Emissions_MetricTons")
            .unwrap();

        assert_eq!(
            artifact.schema.features(),
            &["Industry_Type", "Region", "Energy_TWh"]
        );
        assert!(artifact.schema.is_categorical("Region"));
        assert!(!artifact.schema.is_categorical("Energy_TWh"));
        assert_eq!(artifact.row_counts.train_rows, 24);
        assert_eq!(artifact.row_counts.test_rows, 6);
        assert!(metrics.mae < 1e-3, "mae = {}", metrics.mae);
    }

    #[test]
    fn test_unknown_feature_column_rejected() {
        let config = TrainingConfig::tabular(vec!["Nope".to_string()], Vec::new(), 1);
        let err = Trainer::new(config)
            .train(&sector_rows(), "Co2_Emissions_MetricTons")
            .unwrap_err();
        assert!(matches!(err, EstimationError::FeatureSchema(_)));
    }

    #[test]
    fn test_feature_list_follows_column_order() {
        let rows = linear_rows(10);
        let (artifact, _) = train(&rows, columns::TARGET).unwrap();
        assert_eq!(
            artifact.schema.features(),
            &["electricity_kwh", "shift", "electricity_kwh_lag1"]
        );
        assert_eq!(artifact.schema.target(), columns::TARGET);
    }

    #[test]
    fn test_fits_linear_relationship() {
        let rows = linear_rows(40);
        let trainer = Trainer::new(TrainingConfig {
            estimator: EstimatorKind::Ridge { alpha: 1e-6 },
            ..TrainingConfig::default()
        });
        let (artifact, metrics) = trainer.train(&rows, columns::TARGET).unwrap();
        assert!(metrics.mae < 1e-3, "mae = {}", metrics.mae);
        assert_eq!(artifact.estimator, "ridge");
        assert_eq!(
            artifact.row_counts,
            RowCounts {
                rows: 40,
                train_rows: 32,
                test_rows: 8
            }
        );
        assert_eq!(artifact.metrics, metrics);
    }

    #[test]
    fn test_single_row_reports_train_metrics() {
        let rows = linear_rows(1);
        let (artifact, metrics) = train(&rows, columns::TARGET).unwrap();
        assert_eq!(artifact.row_counts.test_rows, 0);
        assert!(metrics.mae < 1e-9);
    }

    #[test]
    fn test_mean_estimator() {
        let rows = linear_rows(10);
        let trainer = Trainer::new(TrainingConfig {
            estimator: EstimatorKind::Mean,
            split: SplitStrategy::Shuffled { seed: 7 },
            train_fraction: 0.5,
            ..TrainingConfig::default()
        });
        let (artifact, _) = trainer.train(&rows, columns::TARGET).unwrap();
        assert_eq!(artifact.estimator, "mean");
        assert_eq!(artifact.row_counts.train_rows, 5);
    }

    #[test]
    fn test_training_config_from_json() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"estimator": {"kind": "mean"}}"#).unwrap();
        assert_eq!(config.estimator, EstimatorKind::Mean);
        assert_eq!(config.train_fraction, 0.8);
        assert_eq!(config.split, SplitStrategy::Chronological);
        assert_eq!(config.features, FeatureSelection::Engineered);
        assert_eq!(config.categorical, vec!["shift"]);

        let config: TrainingConfig = serde_json::from_str(
            r#"{"features": {"mode": "columns", "columns": ["Region"]}, "categorical": ["Region"]}"#,
        )
        .unwrap();
        assert_eq!(config.features, FeatureSelection::Columns(vec!["Region".to_string()]));
    }
}
