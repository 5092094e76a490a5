//! HTTP API: predictions, prediction history, health checks and Prometheus metrics

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use carbon_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    EmissionRecorder, EstimationError, InferenceService, Intensity, PredictionRecord, Sample,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InferenceService>,
    pub recorder: Arc<dyn EmissionRecorder>,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        service: Arc<InferenceService>,
        recorder: Arc<dyn EmissionRecorder>,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            service,
            recorder,
            health_registry,
            metrics,
            logger,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub company_id: Option<String>,
    pub sample: Option<Sample>,
    pub samples: Option<Vec<Sample>>,
}

#[derive(Debug, Serialize)]
pub struct PredictionBody {
    pub co2e_total_kg: f64,
    pub emission_id: Option<i64>,
    pub recorded_at: DateTime<Utc>,
    pub intensity: Intensity,
}

impl From<PredictionRecord> for PredictionBody {
    fn from(record: PredictionRecord) -> Self {
        Self {
            co2e_total_kg: record.prediction,
            emission_id: record.emission_id,
            recorded_at: record.recorded_at,
            intensity: record.intensity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub company_id: Option<String>,
}

fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "error": message.into(), "kind": kind })),
    )
        .into_response()
}

fn estimation_error_response(err: &EstimationError) -> Response {
    let status = match err {
        EstimationError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.kind(), err.to_string())
}

fn company_id(raw: Option<String>) -> Option<String> {
    raw.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}

/// Score one sample or a batch and record each prediction
async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Response {
    let Some(company_id) = company_id(request.company_id) else {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "company_id is required");
    };

    let (samples, batch) = match (request.sample, request.samples) {
        (_, Some(samples)) if !samples.is_empty() => (samples, true),
        (Some(sample), _) => (vec![sample], false),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "bad_request",
                "sample or a non-empty samples list is required",
            )
        }
    };

    let start = Instant::now();
    let records =
        match state
            .service
            .predict_for_company(&company_id, &samples, state.recorder.as_ref())
        {
            Ok(records) => records,
            Err(e) => {
                state.metrics.inc_prediction_errors(e.kind());
                match e {
                    EstimationError::ModelUnavailable(_) => {
                        warn!(company_id = %company_id, error = %e, "Prediction without a model")
                    }
                    _ => error!(company_id = %company_id, error = %e, "Prediction failed"),
                }
                return estimation_error_response(&e);
            }
        };
    let elapsed = start.elapsed();

    let recorded = records.iter().filter(|r| r.emission_id.is_some()).count();
    state.metrics.observe_prediction_latency(elapsed.as_secs_f64());
    state.metrics.add_predictions(records.len() as u64);
    state.metrics.add_emissions_recorded(recorded as u64);
    if recorded < records.len() {
        state
            .health_registry
            .set_degraded(components::RECORDER, "Failed to persist some predictions")
            .await;
    } else {
        state.health_registry.set_healthy(components::RECORDER).await;
    }

    let total: f64 = records.iter().map(|r| r.prediction).sum();
    state.logger.log_prediction(
        &company_id,
        records.len(),
        total,
        elapsed.as_millis() as u64,
    );

    let mut bodies: Vec<PredictionBody> = records.into_iter().map(Into::into).collect();
    if batch {
        (StatusCode::OK, Json(json!({ "predictions": bodies }))).into_response()
    } else {
        match bodies.pop() {
            Some(body) => (StatusCode::OK, Json(body)).into_response(),
            None => error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "prediction",
                "no prediction produced",
            ),
        }
    }
}

/// Recorded predictions for one company
async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let Some(company_id) = company_id(query.company_id) else {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "company_id is required");
    };

    match state.recorder.history(&company_id) {
        Ok(entries) => (
            StatusCode::OK,
            Json(json!({ "company_id": company_id, "emissions": entries })),
        )
            .into_response(),
        Err(e) => {
            error!(company_id = %company_id, error = %e, "Failed to read history");
            estimation_error_response(&e)
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "metrics", e.to_string());
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/history", get(history))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
