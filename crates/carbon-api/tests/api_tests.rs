//! Integration tests for the emissions API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use carbon_api::api::{create_router, AppState};
use carbon_lib::{
    dummy_artifact,
    health::{components, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    ArtifactStore, EmissionRecorder, InMemoryRecorder, InferenceService,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_app(service: InferenceService) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.observe_model(&service).await;
    health_registry.register(components::RECORDER).await;
    health_registry.set_ready(true).await;

    let state = Arc::new(AppState::new(
        Arc::new(service),
        Arc::new(InMemoryRecorder::new()),
        health_registry,
        ServiceMetrics::new(),
        StructuredLogger::new("test"),
    ));
    (create_router(state.clone()), state)
}

async fn loaded_app() -> (Router, Arc<AppState>) {
    setup_app(InferenceService::from_artifact(dummy_artifact().unwrap())).await
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_predict_single_sample() {
    let (app, state) = loaded_app().await;

    let response = app
        .oneshot(post_json(
            "/predict",
            json!({
                "company_id": "acme",
                "sample": {"electricity_kwh": 100, "diesel_litres": 10, "output_tons": 50}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let total = body["co2e_total_kg"].as_f64().unwrap();
    assert!((total - 92.0).abs() < 1e-9);
    assert_eq!(body["emission_id"], 1);
    assert!(body["recorded_at"].is_string());
    assert!((body["intensity"]["kg_per_kwh"].as_f64().unwrap() - 0.92).abs() < 1e-9);

    assert_eq!(state.recorder.history("acme").unwrap().len(), 1);
}

#[tokio::test]
async fn test_predict_batch_preserves_order() {
    let (app, _state) = loaded_app().await;

    let response = app
        .oneshot(post_json(
            "/predict",
            json!({
                "company_id": "acme",
                "samples": [
                    {"electricity_kwh": 0},
                    {"electricity_kwh": 100},
                    {"electricity_kwh": "20"}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let totals: Vec<f64> = body["predictions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["co2e_total_kg"].as_f64().unwrap())
        .collect();
    assert_eq!(totals, vec![10.0, 60.0, 20.0]);
}

#[tokio::test]
async fn test_predict_requires_company_id() {
    let (app, _state) = loaded_app().await;

    let response = app
        .oneshot(post_json("/predict", json!({"sample": {"electricity_kwh": 1}})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_requires_samples() {
    let (app, _state) = loaded_app().await;

    let response = app
        .oneshot(post_json("/predict", json!({"company_id": "acme", "samples": []})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_without_model_returns_503() {
    let (app, _state) = setup_app(InferenceService::unloaded()).await;

    let response = app
        .oneshot(post_json(
            "/predict",
            json!({"company_id": "acme", "sample": {"electricity_kwh": 1}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "model_unavailable");
}

#[tokio::test]
async fn test_history_lists_company_predictions() {
    let (app, _state) = loaded_app().await;

    for company in ["acme", "acme", "globex"] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/predict",
                json!({"company_id": company, "sample": {"output_tons": 10}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/history?company_id=acme")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["emissions"].as_array().unwrap().len(), 2);
    assert_eq!(body["emissions"][0]["input"]["output_tons"], 10);
}

#[tokio::test]
async fn test_history_requires_company_id() {
    let (app, _state) = loaded_app().await;

    let response = app.oneshot(get("/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_readiness_with_model() {
    let (app, _state) = loaded_app().await;

    let response = app.clone().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health = body_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["components"]["model"]["status"], "healthy");

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ready"], true);
}

#[tokio::test]
async fn test_not_ready_without_model() {
    let (app, _state) = setup_app(InferenceService::unloaded()).await;

    let response = app.clone().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let readiness = body_json(response).await;
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state) = loaded_app().await;

    app.clone()
        .oneshot(post_json(
            "/predict",
            json!({"company_id": "acme", "sample": {"electricity_kwh": 4}}),
        ))
        .await
        .unwrap();

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("carbon_predictions_total"));
}

#[tokio::test]
async fn test_service_loaded_from_saved_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    store.save(&dummy_artifact().unwrap()).unwrap();

    let (app, _state) = setup_app(InferenceService::load(&store).unwrap()).await;
    let response = app
        .oneshot(post_json(
            "/predict",
            json!({"company_id": "acme", "sample": {"diesel_litres": 1}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let total = body_json(response).await["co2e_total_kg"].as_f64().unwrap();
    assert!((total - 12.7).abs() < 1e-9);
}
