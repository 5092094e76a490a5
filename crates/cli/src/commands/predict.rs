//! Local prediction command

use anyhow::{bail, Context, Result};
use carbon_lib::{
    inference::intensity, ArtifactStore, InferenceService, Sample,
};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tabled::Tabled;

use crate::output::{format_kg, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct PredictionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "CO2e")]
    #[serde(skip)]
    display: String,
    #[tabled(skip)]
    co2e_total_kg: f64,
    #[tabled(rename = "kg/kWh")]
    kg_per_kwh: String,
    #[tabled(rename = "kg/t")]
    kg_per_ton: String,
}

/// Parse `--sample`: one JSON object or an array of objects
pub fn parse_samples(raw: &str) -> Result<Vec<Sample>> {
    let value: Value = serde_json::from_str(raw).context("Sample is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => bail!("Sample {} is not a JSON object: {}", i, other),
            })
            .collect(),
        other => bail!("Expected a JSON object or array, got {}", other),
    }
}

pub fn predict(model_dir: &Path, raw_samples: &str, format: OutputFormat) -> Result<()> {
    let samples = parse_samples(raw_samples)?;
    let service = InferenceService::load(&ArtifactStore::new(model_dir))
        .with_context(|| format!("Failed to load model from {}", model_dir.display()))?;
    let predictions = service.predict(&samples).context("Prediction failed")?;

    let fmt_opt = |v: Option<f64>| v.map(|x| format!("{:.4}", x)).unwrap_or_else(|| "-".into());
    let rows: Vec<PredictionRow> = samples
        .iter()
        .zip(&predictions)
        .enumerate()
        .map(|(index, (sample, &prediction))| {
            let i = intensity(sample, prediction);
            PredictionRow {
                index,
                display: format_kg(prediction),
                co2e_total_kg: prediction,
                kg_per_kwh: fmt_opt(i.kg_per_kwh),
                kg_per_ton: fmt_opt(i.kg_per_ton),
            }
        })
        .collect();

    print_table(&rows, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_object() {
        let samples = parse_samples(r#"{"electricity_kwh": 5}"#).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0]["electricity_kwh"], 5);
    }

    #[test]
    fn test_parse_array() {
        let samples = parse_samples(r#"[{"a": 1}, {"b": 2}]"#).unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_rejects_scalars() {
        assert!(parse_samples("42").is_err());
        assert!(parse_samples(r#"[{"a": 1}, 3]"#).is_err());
        assert!(parse_samples("{oops").is_err());
    }
}
