//! Observability for the estimation service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, prediction and recorder counts, model info)
//! - Event-style structured logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::Metrics;

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Registered once per process; `None` if registration failed
static GLOBAL_METRICS: OnceLock<Option<ServiceMetricsInner>> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors: IntCounterVec,
    emissions_recorded: IntCounter,
    model_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn register() -> prometheus::Result<Self> {
        Ok(Self {
            prediction_latency_seconds: register_histogram!(
                "carbon_prediction_latency_seconds",
                "Time spent serving one prediction request",
                LATENCY_BUCKETS.to_vec()
            )?,
            predictions_total: register_int_counter!(
                "carbon_predictions_total",
                "Total number of samples scored"
            )?,
            prediction_errors: register_int_counter_vec!(
                "carbon_prediction_errors_total",
                "Prediction requests that failed, by error kind",
                &["kind"]
            )?,
            emissions_recorded: register_int_counter!(
                "carbon_emissions_recorded_total",
                "Predictions persisted to the emission history"
            )?,
            model_info: register_gauge_vec!(
                "carbon_model_info",
                "Information about the loaded model artifact",
                &["schema_version", "estimator"]
            )?,
        })
    }
}

/// Handle to the process-wide metrics. Clones share the same series.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(|| match ServiceMetricsInner::register() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Failed to register Prometheus metrics");
                None
            }
        });
        Self { _private: () }
    }

    fn inner(&self) -> Option<&ServiceMetricsInner> {
        GLOBAL_METRICS.get().and_then(Option::as_ref)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        if let Some(m) = self.inner() {
            m.prediction_latency_seconds.observe(duration_secs);
        }
    }

    pub fn add_predictions(&self, count: u64) {
        if let Some(m) = self.inner() {
            m.predictions_total.inc_by(count);
        }
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        if let Some(m) = self.inner() {
            m.prediction_errors.with_label_values(&[kind]).inc();
        }
    }

    pub fn add_emissions_recorded(&self, count: u64) {
        if let Some(m) = self.inner() {
            m.emissions_recorded.inc_by(count);
        }
    }

    /// Replace the model info series with the given artifact description
    pub fn set_model_info(&self, schema_version: u32, estimator: &str) {
        if let Some(m) = self.inner() {
            let version = schema_version.to_string();
            m.model_info.reset();
            m.model_info
                .with_label_values(&[version.as_str(), estimator])
                .set(1.0);
        }
    }
}

/// Event-style log lines for service lifecycle and model events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model_loaded: bool) {
        if model_loaded {
            info!(
                event = "service_started",
                service = %self.service,
                version = %version,
                model_loaded = true,
                "Emissions service started"
            );
        } else {
            warn!(
                event = "service_started",
                service = %self.service,
                version = %version,
                model_loaded = false,
                "Emissions service started without a model, predictions will return 503"
            );
        }
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Emissions service shutting down"
        );
    }

    pub fn log_training_complete(&self, estimator: &str, features: usize, metrics: &Metrics) {
        info!(
            event = "training_complete",
            service = %self.service,
            estimator = %estimator,
            features = features,
            mae = metrics.mae,
            rmse = metrics.rmse,
            r2 = metrics.r2,
            "Model trained"
        );
    }

    pub fn log_prediction(&self, company_id: &str, samples: usize, total_kg: f64, latency_ms: u64) {
        info!(
            event = "prediction_served",
            service = %self.service,
            company_id = %company_id,
            samples = samples,
            co2e_total_kg = total_kg,
            latency_ms = latency_ms,
            "Served emissions prediction"
        );
    }
}
