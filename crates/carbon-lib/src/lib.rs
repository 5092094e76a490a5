//! Core library for CO2e emissions estimation
//!
//! This crate provides:
//! - A schema registry pinning the feature contract between training and serving
//! - Temporal feature engineering over per-site sensor readings
//! - A training pipeline with pluggable estimators
//! - Artifact persistence and an inference adapter for JSON samples
//! - Health checks and observability for the serving process

pub mod artifact;
pub mod error;
pub mod features;
pub mod health;
pub mod inference;
pub mod models;
pub mod observability;
pub mod schema;
pub mod training;

pub use artifact::{dummy_artifact, ArtifactStore, FittedPipelineArtifact, Manifest};
pub use error::{EstimationError, Result};
pub use features::{engineer, EngineConfig, FeatureEngine};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use inference::{
    EmissionEntry, EmissionRecorder, InMemoryRecorder, InferenceService, Sample,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use schema::{columns, SchemaRegistry};
pub use training::{train, FittedPipeline, Trainer, TrainingConfig};
