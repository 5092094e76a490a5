//! Persistence of fitted pipelines
//!
//! The artifact directory holds two files:
//! - `emissions_model.bin`: a self-verifying envelope around the
//!   bincode-encoded [`FittedPipelineArtifact`] and its SHA-256
//! - `model_manifest.json`: human-readable summary carrying the same checksum
//!
//! Each file is written to a temporary file, synced and renamed into place.
//! Loading trusts only the envelope, so a reader that sees a new binary next
//! to an old manifest still gets one complete artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{EstimationError, Result};
use crate::models::{Metrics, RowCounts};
use crate::schema::{columns, default_feature_list, SchemaRegistry, SCHEMA_VERSION};
use crate::training::{FittedModel, FittedPipeline, LinearModel, Preprocessor};

pub const MODEL_FILE: &str = "emissions_model.bin";
pub const MANIFEST_FILE: &str = "model_manifest.json";

/// Fitted pipeline bundled with the schema it was trained against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipelineArtifact {
    pub schema: SchemaRegistry,
    pub pipeline: FittedPipeline,
    pub metrics: Metrics,
    pub row_counts: RowCounts,
    pub estimator: String,
    pub trained_at: DateTime<Utc>,
}

impl FittedPipelineArtifact {
    /// Structural checks run after decoding
    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;
        if self.pipeline.n_features_in() != self.schema.len() {
            return Err(EstimationError::FeatureSchema(format!(
                "pipeline consumes {} columns but schema lists {}",
                self.pipeline.n_features_in(),
                self.schema.len()
            )));
        }
        self.pipeline.check_widths()
    }
}

/// Summary written next to the binary artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub features: Vec<String>,
    pub target: String,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: Metrics,
    pub estimator: String,
    pub trained_at: DateTime<Utc>,
    pub checksum: String,
}

impl Manifest {
    fn describe(artifact: &FittedPipelineArtifact, checksum: String) -> Self {
        Self {
            schema_version: artifact.schema.schema_version(),
            features: artifact.schema.features().to_vec(),
            target: artifact.schema.target().to_string(),
            rows: artifact.row_counts.rows,
            train_rows: artifact.row_counts.train_rows,
            test_rows: artifact.row_counts.test_rows,
            metrics: artifact.metrics,
            estimator: artifact.estimator.clone(),
            trained_at: artifact.trained_at,
            checksum,
        }
    }
}

/// On-disk layout of the binary file
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    checksum: String,
    payload: Vec<u8>,
}

impl Envelope {
    fn seal(artifact: &FittedPipelineArtifact) -> Result<Self> {
        let payload = bincode::serialize(artifact)
            .map_err(|e| EstimationError::CorruptArtifact(format!("encode failed: {}", e)))?;
        Ok(Self {
            checksum: compute_checksum(&payload),
            payload,
        })
    }

    fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| EstimationError::CorruptArtifact(format!("encode failed: {}", e)))
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| EstimationError::CorruptArtifact(format!("bad envelope: {}", e)))
    }

    /// Verify the checksum, then decode the artifact
    fn open(&self) -> Result<FittedPipelineArtifact> {
        let computed = compute_checksum(&self.payload);
        if computed != self.checksum {
            return Err(EstimationError::CorruptArtifact(format!(
                "checksum mismatch: recorded {}, computed {}",
                self.checksum, computed
            )));
        }
        bincode::deserialize(&self.payload)
            .map_err(|e| EstimationError::CorruptArtifact(format!("decode failed: {}", e)))
    }
}

/// Reads and writes artifacts in one directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Persist the artifact and its manifest
    pub fn save(&self, artifact: &FittedPipelineArtifact) -> Result<Manifest> {
        artifact.validate()?;
        fs::create_dir_all(&self.dir)?;

        let envelope = Envelope::seal(artifact)?;
        let bytes = envelope.encode()?;
        write_atomic(&self.model_path(), &bytes)?;

        let manifest = Manifest::describe(artifact, envelope.checksum);
        write_atomic(
            &self.manifest_path(),
            serde_json::to_string_pretty(&manifest)?.as_bytes(),
        )?;

        info!(
            path = %self.model_path().display(),
            size = bytes.len(),
            checksum = %manifest.checksum,
            features = manifest.features.len(),
            "Saved model artifact"
        );
        Ok(manifest)
    }

    /// Load and verify the artifact
    pub fn load(&self) -> Result<FittedPipelineArtifact> {
        let path = self.model_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EstimationError::ModelUnavailable(format!(
                    "no artifact at {}",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let envelope = Envelope::decode(&bytes)?;
        let artifact = envelope.open()?;
        debug!(checksum = %envelope.checksum, "Artifact checksum validated");

        match self.load_manifest() {
            Ok(manifest) if manifest.checksum != envelope.checksum => {
                warn!(
                    manifest = %manifest.checksum,
                    artifact = %envelope.checksum,
                    "Manifest describes a different artifact"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    path = %self.manifest_path().display(),
                    error = %e,
                    "Manifest unavailable"
                );
            }
        }

        if artifact.schema.schema_version() > SCHEMA_VERSION {
            return Err(EstimationError::FeatureSchema(format!(
                "artifact schema version {} is newer than supported {}",
                artifact.schema.schema_version(),
                SCHEMA_VERSION
            )));
        }
        artifact.validate()?;

        info!(
            path = %path.display(),
            estimator = %artifact.estimator,
            features = artifact.schema.len(),
            "Loaded model artifact"
        );
        Ok(artifact)
    }

    pub fn load_manifest(&self) -> Result<Manifest> {
        let path = self.manifest_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EstimationError::ModelUnavailable(format!(
                    "no manifest at {}",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map_err(|e| EstimationError::CorruptArtifact(format!("bad manifest: {}", e)))
    }
}

/// Emission-factor artifact over the full default feature list:
/// `10 + 0.5·kWh + 2.7·L diesel + 0.1·t output`. Used to smoke-test serving
/// before a trained model exists.
pub fn dummy_artifact() -> Result<FittedPipelineArtifact> {
    let schema = SchemaRegistry::new(default_feature_list(), columns::TARGET)?;
    let preprocessor = Preprocessor::identity(&schema);
    let coefficients = preprocessor
        .output_names()
        .iter()
        .map(|name| match name.as_str() {
            columns::ELECTRICITY => 0.5,
            columns::DIESEL => 2.7,
            columns::OUTPUT => 0.1,
            _ => 0.0,
        })
        .collect();
    let pipeline = FittedPipeline::new(
        preprocessor,
        FittedModel::Linear(LinearModel {
            intercept: 10.0,
            coefficients,
        }),
    )?;
    Ok(FittedPipelineArtifact {
        schema,
        pipeline,
        metrics: Metrics {
            mae: 0.0,
            rmse: 0.0,
            r2: 0.0,
        },
        row_counts: RowCounts {
            rows: 0,
            train_rows: 0,
            test_rows: 0,
        },
        estimator: "emission_factor".to_string(),
        trained_at: Utc::now(),
    })
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let written = File::create(&temp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    });
    if let Err(e) = written {
        // Best-effort cleanup
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}
