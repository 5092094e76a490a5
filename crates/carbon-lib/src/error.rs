//! Error kinds surfaced by the estimation core
//!
//! Every variant is a recoverable, caller-facing condition. Malformed input
//! fields never end up here: they are coerced to zero by the feature engine
//! and the inference row builder.

use thiserror::Error;

/// Errors produced by training, artifact handling and inference
#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("No rows available to train on")]
    EmptyDataset,

    #[error("Target column '{0}' is absent from the engineered frame")]
    MissingTarget(String),

    #[error("Invalid feature schema: {0}")]
    FeatureSchema(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Training failed: {0}")]
    Training(String),

    #[error("Corrupt model artifact: {0}")]
    CorruptArtifact(String),

    #[error("Emission recorder failed: {0}")]
    Recorder(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EstimationError {
    /// Short machine-friendly label, used as a log field and metric label
    pub fn kind(&self) -> &'static str {
        match self {
            EstimationError::EmptyDataset => "empty_dataset",
            EstimationError::MissingTarget(_) => "missing_target",
            EstimationError::FeatureSchema(_) => "feature_schema",
            EstimationError::ModelUnavailable(_) => "model_unavailable",
            EstimationError::Prediction(_) => "prediction",
            EstimationError::Training(_) => "training",
            EstimationError::CorruptArtifact(_) => "corrupt_artifact",
            EstimationError::Recorder(_) => "recorder",
            EstimationError::Io(_) => "io",
            EstimationError::Csv(_) => "csv",
            EstimationError::Json(_) => "json",
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EstimationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = EstimationError::MissingTarget("co2e_observed_kg".to_string());
        assert!(err.to_string().contains("co2e_observed_kg"));
        assert_eq!(err.kind(), "missing_target");
    }

    #[test]
    fn test_io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EstimationError = io.into();
        assert_eq!(err.kind(), "io");
    }
}
