//! Column preprocessing: one-hot encoding for categorical columns and
//! standard scaling for numeric ones
//!
//! Encodings are learned on the training split and stored in the artifact,
//! so serving applies exactly the scheme the estimator was fitted on.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{EstimationError, Result};
use crate::models::FeatureValue;
use crate::schema::SchemaRegistry;

/// Learned encoding of one input column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnEncoding {
    /// One output per known category; unknown categories encode as all zeros
    OneHot { categories: Vec<String> },
    /// `(x - mean) / scale`
    Scaled { mean: f64, scale: f64 },
}

impl ColumnEncoding {
    fn width(&self) -> usize {
        match self {
            ColumnEncoding::OneHot { categories } => categories.len(),
            ColumnEncoding::Scaled { .. } => 1,
        }
    }
}

/// Fitted preprocessing stage, one encoding per schema column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    columns: Vec<(String, ColumnEncoding)>,
}

impl Preprocessor {
    /// Learn encodings from schema-ordered training rows
    pub fn fit(schema: &SchemaRegistry, rows: &[Vec<FeatureValue>]) -> Self {
        let columns = schema
            .features()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let encoding = if schema.is_categorical(name) {
                    let categories: BTreeSet<String> =
                        rows.iter().map(|row| row[idx].as_category()).collect();
                    ColumnEncoding::OneHot {
                        categories: categories.into_iter().collect(),
                    }
                } else {
                    let values: Vec<f64> = rows.iter().map(|row| row[idx].as_f64()).collect();
                    let (mean, std) = mean_std(&values);
                    ColumnEncoding::Scaled {
                        mean,
                        scale: if std > f64::EPSILON { std } else { 1.0 },
                    }
                };
                (name.clone(), encoding)
            })
            .collect();
        Self { columns }
    }

    /// Pass-through stage: numeric columns unscaled, categorical columns
    /// contribute no outputs
    pub fn identity(schema: &SchemaRegistry) -> Self {
        let columns = schema
            .features()
            .iter()
            .map(|name| {
                let encoding = if schema.is_categorical(name) {
                    ColumnEncoding::OneHot {
                        categories: Vec::new(),
                    }
                } else {
                    ColumnEncoding::Scaled {
                        mean: 0.0,
                        scale: 1.0,
                    }
                };
                (name.clone(), encoding)
            })
            .collect();
        Self { columns }
    }

    pub fn n_features_in(&self) -> usize {
        self.columns.len()
    }

    pub fn n_features_out(&self) -> usize {
        self.columns.iter().map(|(_, e)| e.width()).sum()
    }

    /// Names of the encoded outputs, e.g. `shift=A` or `temp_c`
    pub fn output_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.n_features_out());
        for (name, encoding) in &self.columns {
            match encoding {
                ColumnEncoding::OneHot { categories } => {
                    names.extend(categories.iter().map(|c| format!("{}={}", name, c)))
                }
                ColumnEncoding::Scaled { .. } => names.push(name.clone()),
            }
        }
        names
    }

    pub fn encoding(&self, column: &str) -> Option<&ColumnEncoding> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, e)| e)
    }

    /// Encode schema-ordered rows into a dense design matrix
    pub fn transform(&self, rows: &[Vec<FeatureValue>]) -> Result<Array2<f64>> {
        let width = self.n_features_out();
        let mut out = Array2::<f64>::zeros((rows.len(), width));
        for (r, row) in rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(EstimationError::FeatureSchema(format!(
                    "row {} has {} values, pipeline expects {}",
                    r,
                    row.len(),
                    self.columns.len()
                )));
            }
            let mut c = 0;
            for ((_, encoding), value) in self.columns.iter().zip(row) {
                match encoding {
                    ColumnEncoding::OneHot { categories } => {
                        let category = value.as_category();
                        if let Some(pos) = categories.iter().position(|k| *k == category) {
                            out[[r, c + pos]] = 1.0;
                        }
                    }
                    ColumnEncoding::Scaled { mean, scale } => {
                        out[[r, c]] = (value.as_f64() - mean) / scale;
                    }
                }
                c += encoding.width();
            }
        }
        Ok(out)
    }
}

/// Mean and population standard deviation
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
