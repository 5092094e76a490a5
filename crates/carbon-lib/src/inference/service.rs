//! Process-lifetime owner of the loaded artifact

use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

use super::{predict, EmissionRecorder, Sample};
use crate::artifact::{ArtifactStore, FittedPipelineArtifact};
use crate::error::{EstimationError, Result};
use crate::models::{Intensity, Metrics, PredictionRecord};
use crate::schema::{columns, SchemaRegistry};

/// Serving latency above which a warning is logged
const SLOW_PREDICTION_MS: u128 = 50;

/// Read-only serving state, constructed once and shared behind `Arc`
#[derive(Debug, Default)]
pub struct InferenceService {
    artifact: Option<FittedPipelineArtifact>,
    prediction_count: AtomicU64,
    slow_prediction_count: AtomicU64,
}

impl InferenceService {
    /// Load the artifact from a store
    pub fn load(store: &ArtifactStore) -> Result<Self> {
        Ok(Self::from_artifact(store.load()?))
    }

    pub fn from_artifact(artifact: FittedPipelineArtifact) -> Self {
        Self {
            artifact: Some(artifact),
            ..Self::default()
        }
    }

    /// Service with no model; every prediction fails with `ModelUnavailable`
    pub fn unloaded() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn artifact(&self) -> Option<&FittedPipelineArtifact> {
        self.artifact.as_ref()
    }

    pub fn schema(&self) -> Option<&SchemaRegistry> {
        self.artifact.as_ref().map(|a| &a.schema)
    }

    pub fn metrics(&self) -> Option<Metrics> {
        self.artifact.as_ref().map(|a| a.metrics)
    }

    /// Estimator name of the loaded artifact
    pub fn estimator(&self) -> Option<&str> {
        self.artifact.as_ref().map(|a| a.estimator.as_str())
    }

    pub fn predict(&self, samples: &[Sample]) -> Result<Vec<f64>> {
        let artifact = self.artifact.as_ref().ok_or_else(|| {
            EstimationError::ModelUnavailable("no model artifact loaded".to_string())
        })?;

        let start = Instant::now();
        let predictions = predict(samples, &artifact.schema, Some(&artifact.pipeline))?;
        let elapsed = start.elapsed();

        self.prediction_count
            .fetch_add(samples.len() as u64, Ordering::Relaxed);
        if elapsed.as_millis() > SLOW_PREDICTION_MS {
            self.slow_prediction_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                samples = samples.len(),
                latency_ms = elapsed.as_millis() as u64,
                "Prediction exceeded latency target"
            );
        }
        Ok(predictions)
    }

    /// Predict, then persist each prediction through the recorder. A recorder
    /// failure leaves `emission_id` empty but keeps the prediction.
    pub fn predict_for_company(
        &self,
        company_id: &str,
        samples: &[Sample],
        recorder: &dyn EmissionRecorder,
    ) -> Result<Vec<PredictionRecord>> {
        let predictions = self.predict(samples)?;
        let records = samples
            .iter()
            .zip(predictions)
            .map(|(sample, prediction)| {
                let recorded_at = Utc::now();
                let emission_id = match recorder.record(company_id, sample, prediction, recorded_at)
                {
                    Ok(id) => Some(id),
                    Err(e) => {
                        warn!(
                            company_id = %company_id,
                            error = %e,
                            "Failed to record prediction"
                        );
                        None
                    }
                };
                PredictionRecord {
                    prediction,
                    emission_id,
                    recorded_at,
                    intensity: intensity(sample, prediction),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            company_id = %company_id,
            predictions = records.len(),
            "Predictions recorded"
        );
        Ok(records)
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_predictions: self.prediction_count.load(Ordering::Relaxed),
            slow_batches: self.slow_prediction_count.load(Ordering::Relaxed),
        }
    }
}

/// Serving counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_predictions: u64,
    pub slow_batches: u64,
}

/// kg CO2e per kWh and per ton of output, when those drivers are positive
pub fn intensity(sample: &Sample, prediction: f64) -> Intensity {
    let per = |column: &str| {
        let amount = sample.get(column).and_then(positive)?;
        Some(prediction / amount)
    };
    Intensity {
        kg_per_kwh: per(columns::ELECTRICITY),
        kg_per_ton: per(columns::OUTPUT),
    }
}

fn positive(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (v.is_finite() && v > 0.0).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::dummy_artifact;
    use crate::inference::{EmissionEntry, InMemoryRecorder};
    use serde_json::json;

    fn sample(value: Value) -> Sample {
        match value {
            Value::Object(map) => map,
            _ => panic!("sample must be an object"),
        }
    }

    struct FailingRecorder;

    impl EmissionRecorder for FailingRecorder {
        fn record(
            &self,
            _company_id: &str,
            _input: &Sample,
            _co2e_total_kg: f64,
            _recorded_at: chrono::DateTime<Utc>,
        ) -> Result<i64> {
            Err(EstimationError::Recorder("database offline".to_string()))
        }

        fn history(&self, _company_id: &str) -> Result<Vec<EmissionEntry>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_unloaded_service() {
        let service = InferenceService::unloaded();
        assert!(!service.is_loaded());
        assert!(service.schema().is_none());
        let err = service.predict(&[Sample::new()]).unwrap_err();
        assert!(matches!(err, EstimationError::ModelUnavailable(_)));
    }

    #[test]
    fn test_predict_for_company_records_each_sample() {
        let service = InferenceService::from_artifact(dummy_artifact().unwrap());
        let recorder = InMemoryRecorder::new();
        let samples = vec![
            sample(json!({"electricity_kwh": 100, "output_tons": 2})),
            sample(json!({"diesel_litres": 10})),
        ];

        let records = service
            .predict_for_company("acme", &samples, &recorder)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!((records[0].prediction - 60.2).abs() < 1e-9);
        assert!((records[1].prediction - 37.0).abs() < 1e-9);
        assert!(records[0].emission_id.is_some());
        assert_ne!(records[0].emission_id, records[1].emission_id);
        assert_eq!(recorder.history("acme").unwrap().len(), 2);
        assert_eq!(service.stats().total_predictions, 2);
    }

    #[test]
    fn test_recorder_failure_keeps_prediction() {
        let service = InferenceService::from_artifact(dummy_artifact().unwrap());
        let records = service
            .predict_for_company("acme", &[Sample::new()], &FailingRecorder)
            .unwrap();
        assert_eq!(records[0].prediction, 10.0);
        assert_eq!(records[0].emission_id, None);
    }

    #[test]
    fn test_intensity() {
        let s = sample(json!({"electricity_kwh": 50, "output_tons": "0"}));
        let i = intensity(&s, 25.0);
        assert_eq!(i.kg_per_kwh, Some(0.5));
        assert_eq!(i.kg_per_ton, None);
    }
}
