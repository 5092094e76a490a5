//! Core data models for the emissions estimator

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::columns;

/// A raw cell value as read from a sensor log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Missing,
}

impl RawValue {
    /// Parse a raw text cell. Empty cells and common null markers are missing.
    pub fn parse(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() || matches!(trimmed, "NaN" | "nan" | "NA" | "null" | "None") {
            return RawValue::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) => RawValue::Number(v),
            Err(_) => RawValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Number(v) => v.is_nan(),
            RawValue::Text(_) => false,
        }
    }

    /// Numeric coercion: non-numeric text, missing and non-finite values become zero
    pub fn coerce_f64(&self) -> f64 {
        let v = match self {
            RawValue::Number(v) => *v,
            RawValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            RawValue::Missing => 0.0,
        };
        finite_or_zero(v)
    }

    /// Categorical coercion: integral numbers print without a fractional part
    pub fn coerce_category(&self) -> String {
        match self {
            RawValue::Text(s) => s.clone(),
            RawValue::Number(v) => format_category(*v),
            RawValue::Missing => "0".to_string(),
        }
    }
}

/// One row per (site, timestamp) sensor observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub site_id: Option<String>,
    /// Instant plus the offset it was logged with; calendar fields use the
    /// local clock time
    pub timestamp: DateTime<FixedOffset>,
    /// Every other raw column, keyed by its raw name
    pub values: BTreeMap<String, RawValue>,
}

impl Reading {
    pub fn new(site_id: Option<&str>, timestamp: impl Into<DateTime<FixedOffset>>) -> Self {
        Self {
            site_id: site_id.map(str::to_string),
            timestamp: timestamp.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style helper for numeric columns
    pub fn with_number(mut self, column: &str, value: f64) -> Self {
        self.values.insert(column.to_string(), RawValue::Number(value));
        self
    }

    /// Builder-style helper for arbitrary raw values
    pub fn with_value(mut self, column: &str, value: RawValue) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }
}

/// An engineered cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl FeatureValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            FeatureValue::Number(v) => finite_or_zero(*v),
            FeatureValue::Category(s) => finite_or_zero(s.trim().parse().unwrap_or(0.0)),
        }
    }

    pub fn as_category(&self) -> String {
        match self {
            FeatureValue::Number(v) => format_category(*v),
            FeatureValue::Category(s) => s.clone(),
        }
    }
}

/// Engineered representation of one reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub site_id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub values: BTreeMap<String, FeatureValue>,
}

impl FeatureRow {
    pub fn get(&self, column: &str) -> Option<&FeatureValue> {
        self.values.get(column)
    }

    /// Numeric view of a column, `None` when the column is absent
    pub fn number(&self, column: &str) -> Option<f64> {
        self.values.get(column).map(FeatureValue::as_f64)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Column names in the stable engine order
    pub fn columns(&self) -> Vec<String> {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort_by_key(|name| (columns::rank(name), name.as_str()));
        names.into_iter().cloned().collect()
    }
}

/// Held-out evaluation metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

/// Row counts recorded alongside the metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounts {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Emission intensity derived from a prediction and its input sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Intensity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kg_per_kwh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kg_per_ton: Option<f64>,
}

/// Per-sample serving output handed back to the API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub prediction: f64,
    pub emission_id: Option<i64>,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub intensity: Intensity,
}

pub(crate) fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn format_category(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_parsing() {
        assert_eq!(RawValue::parse("12.5"), RawValue::Number(12.5));
        assert_eq!(RawValue::parse("  "), RawValue::Missing);
        assert_eq!(RawValue::parse("NaN"), RawValue::Missing);
        assert_eq!(RawValue::parse("A"), RawValue::Text("A".to_string()));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(RawValue::Text("oops".to_string()).coerce_f64(), 0.0);
        assert_eq!(RawValue::Text(" 3 ".to_string()).coerce_f64(), 3.0);
        assert_eq!(RawValue::Number(f64::INFINITY).coerce_f64(), 0.0);
        assert_eq!(RawValue::Missing.coerce_f64(), 0.0);
        assert!(RawValue::Number(f64::NAN).is_missing());
    }

    #[test]
    fn test_category_coercion() {
        assert_eq!(RawValue::Number(2.0).coerce_category(), "2");
        assert_eq!(RawValue::Missing.coerce_category(), "0");
        assert_eq!(FeatureValue::Number(0.0).as_category(), "0");
        assert_eq!(FeatureValue::Category("B".to_string()).as_f64(), 0.0);
    }
}
