//! Inference adapter
//!
//! Maps JSON samples onto the training schema and runs the fitted pipeline.

mod recorder;
mod rows;
mod service;

pub use recorder::{EmissionEntry, EmissionRecorder, InMemoryRecorder};
pub use rows::build_row;
pub use service::{intensity, InferenceService, InferenceStats};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{EstimationError, Result};
use crate::schema::SchemaRegistry;
use crate::training::FittedPipeline;

/// One inference input: feature name to raw JSON value
pub type Sample = Map<String, Value>;

/// Predict one value per sample, in input order
pub fn predict(
    samples: &[Sample],
    schema: &SchemaRegistry,
    pipeline: Option<&FittedPipeline>,
) -> Result<Vec<f64>> {
    if schema.is_empty() {
        return Err(EstimationError::FeatureSchema(
            "schema has no features".to_string(),
        ));
    }
    let pipeline = pipeline
        .ok_or_else(|| EstimationError::ModelUnavailable("no fitted pipeline".to_string()))?;

    let rows: Vec<_> = samples.iter().map(|s| build_row(s, schema)).collect();
    debug!(
        samples = samples.len(),
        features = schema.len(),
        "Built inference rows"
    );
    pipeline.predict(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::dummy_artifact;
    use serde_json::json;

    fn sample(value: Value) -> Sample {
        match value {
            Value::Object(map) => map,
            _ => panic!("sample must be an object"),
        }
    }

    #[test]
    fn test_batch_order_preserved() {
        let artifact = dummy_artifact().unwrap();
        let samples: Vec<Sample> = [0.0, 100.0, 20.0]
            .iter()
            .map(|kwh| sample(json!({ "electricity_kwh": kwh })))
            .collect();
        let preds = predict(&samples, &artifact.schema, Some(&artifact.pipeline)).unwrap();
        assert_eq!(preds, vec![10.0, 60.0, 20.0]);

        // Each batch element equals its own single-sample prediction
        for (s, expected) in samples.iter().zip(&preds) {
            let single =
                predict(std::slice::from_ref(s), &artifact.schema, Some(&artifact.pipeline))
                    .unwrap();
            assert_eq!(single, vec![*expected]);
        }
    }

    #[test]
    fn test_missing_pipeline_is_unavailable() {
        let artifact = dummy_artifact().unwrap();
        let err = predict(&[Sample::new()], &artifact.schema, None).unwrap_err();
        assert!(matches!(err, EstimationError::ModelUnavailable(_)));
    }

    #[test]
    fn test_empty_schema_checked_before_pipeline() {
        let empty: SchemaRegistry =
            serde_json::from_str(r#"{"schema_version":1,"features":[],"target":"y"}"#).unwrap();
        let err = predict(&[Sample::new()], &empty, None).unwrap_err();
        assert!(matches!(err, EstimationError::FeatureSchema(_)));
    }

    #[test]
    fn test_width_mismatch_is_schema_error() {
        let artifact = dummy_artifact().unwrap();
        let narrow = SchemaRegistry::new(vec!["electricity_kwh".to_string()], "y").unwrap();
        let err = predict(&[Sample::new()], &narrow, Some(&artifact.pipeline)).unwrap_err();
        assert!(matches!(err, EstimationError::FeatureSchema(_)));
    }

    #[test]
    fn test_empty_batch() {
        let artifact = dummy_artifact().unwrap();
        let preds = predict(&[], &artifact.schema, Some(&artifact.pipeline)).unwrap();
        assert!(preds.is_empty());
    }
}
