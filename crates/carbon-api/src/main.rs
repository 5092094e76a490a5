//! carbon-api - CO2e emissions prediction service
//!
//! Loads the trained artifact once at startup and serves predictions over HTTP.

use anyhow::Result;
use carbon_api::{api, config::ApiConfig};
use carbon_lib::{
    health::{components, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    ArtifactStore, InMemoryRecorder, InferenceService,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting carbon-api");

    let config = ApiConfig::load()?;
    info!(
        port = config.port,
        model_dir = %config.model_dir.display(),
        "Service configured"
    );

    // A missing or broken artifact keeps the process up; /readyz reports it
    let store = ArtifactStore::new(&config.model_dir);
    let service = match InferenceService::load(&store) {
        Ok(service) => service,
        Err(e) => {
            warn!(error = %e, kind = e.kind(), "Model artifact not loaded");
            InferenceService::unloaded()
        }
    };

    let health_registry = HealthRegistry::new();
    health_registry.observe_model(&service).await;
    health_registry.register(components::RECORDER).await;

    let metrics = ServiceMetrics::new();
    if let Some(artifact) = service.artifact() {
        metrics.set_model_info(artifact.schema.schema_version(), &artifact.estimator);
    }

    let logger = StructuredLogger::new(&config.service_name);
    logger.log_startup(SERVICE_VERSION, service.is_loaded());

    let app_state = Arc::new(api::AppState::new(
        Arc::new(service),
        Arc::new(InMemoryRecorder::with_history_limit(config.history_limit)),
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));

    health_registry.set_ready(true).await;

    tokio::select! {
        result = api::serve(config.port, app_state) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
