//! Service configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable prefix, e.g. `CARBON_PORT`
pub const ENV_PREFIX: &str = "CARBON";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiConfig {
    /// Listen port for prediction, health and metrics routes
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding `emissions_model.bin` and its manifest
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Name attached to structured log events
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Prediction history entries kept per company
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_port() -> u16 {
    8080
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_service_name() -> String {
    "carbon-api".to_string()
}

fn default_history_limit() -> usize {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            model_dir: default_model_dir(),
            service_name: default_service_name(),
            history_limit: default_history_limit(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from `CARBON_*` environment variables
    pub fn load() -> Result<Self> {
        Self::load_with_prefix(ENV_PREFIX)
    }

    pub fn load_with_prefix(prefix: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix).try_parsing(true))
            .build()
            .context("Failed to read environment configuration")?;

        config
            .try_deserialize()
            .with_context(|| format!("Invalid {}_* configuration", prefix))
    }
}
