//! Feature engineering command

use anyhow::{Context, Result};
use carbon_lib::{
    features::{load_readings, write_feature_rows},
    FeatureEngine,
};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use crate::output::{print_json, print_success, OutputFormat};

/// Engineer a sensor log into the feature frame
pub fn engineer(input: &Path, output: Option<&Path>, format: OutputFormat) -> Result<()> {
    let readings = load_readings(input)
        .with_context(|| format!("Failed to read sensor log {}", input.display()))?;
    let rows = FeatureEngine::new().engineer(&readings);

    let Some(path) = output else {
        // Frame goes to stdout, so no summary
        write_feature_rows(&rows, io::stdout().lock()).context("Failed to write features")?;
        return Ok(());
    };

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_feature_rows(&rows, BufWriter::new(file))
        .with_context(|| format!("Failed to write features to {}", path.display()))?;

    let columns = rows.first().map(|r| r.columns().len()).unwrap_or(0);
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "readings": readings.len(),
            "rows": rows.len(),
            "columns": columns,
            "output": path.display().to_string(),
        }))?,
        OutputFormat::Table => print_success(&format!(
            "Engineered {} rows x {} columns from {} readings into {}",
            rows.len(),
            columns,
            readings.len(),
            path.display()
        )),
    }
    Ok(())
}
