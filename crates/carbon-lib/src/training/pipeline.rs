//! Fitted preprocessing + estimator composition

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::estimator::FittedModel;
use super::preprocess::Preprocessor;
use crate::error::{EstimationError, Result};
use crate::models::FeatureValue;

/// Trained pipeline: encode schema-ordered rows, then regress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    preprocessor: Preprocessor,
    model: FittedModel,
}

impl FittedPipeline {
    pub fn new(preprocessor: Preprocessor, model: FittedModel) -> Result<Self> {
        let pipeline = Self {
            preprocessor,
            model,
        };
        pipeline.check_widths()?;
        Ok(pipeline)
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    /// Number of schema columns each input row must carry
    pub fn n_features_in(&self) -> usize {
        self.preprocessor.n_features_in()
    }

    /// Encoded width must match what the model was fitted on
    pub fn check_widths(&self) -> Result<()> {
        match self.model.n_inputs() {
            Some(n) if n != self.preprocessor.n_features_out() => {
                Err(EstimationError::FeatureSchema(format!(
                    "preprocessor emits {} columns but model expects {}",
                    self.preprocessor.n_features_out(),
                    n
                )))
            }
            _ => Ok(()),
        }
    }

    /// One prediction per row, in input order
    pub fn predict(&self, rows: &[Vec<FeatureValue>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let x = self.preprocessor.transform(rows)?;
        let y = self.model.predict(&x).map_err(|e| match e {
            EstimationError::Prediction(_) => e,
            other => EstimationError::Prediction(other.to_string()),
        })?;
        debug!(rows = rows.len(), "Pipeline prediction complete");
        Ok(y.to_vec())
    }
}
