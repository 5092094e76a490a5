//! Feature schema shared by training and serving
//!
//! The registry is the ordered column contract the fitted pipeline was
//! trained against. It is written into the artifact and the manifest and is
//! read back unchanged at inference time.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{EstimationError, Result};

/// Version of the registry layout stored in artifacts and manifests
pub const SCHEMA_VERSION: u32 = 2;

/// Canonical column names used across the pipeline
pub mod columns {
    pub const SITE_ID: &str = "site_id";
    pub const TIMESTAMP: &str = "timestamp";
    pub const DEFAULT_SITE: &str = "SITE_1";

    pub const ELECTRICITY: &str = "electricity_kwh";
    pub const DIESEL: &str = "diesel_litres";
    pub const OUTPUT: &str = "output_tons";
    pub const TEMPERATURE: &str = "temp_c";
    pub const EQUIPMENT_LOAD: &str = "equipment_load_pct";
    pub const SHIFT: &str = "shift";
    pub const HOUR: &str = "hour";
    pub const DAY_OF_WEEK: &str = "dow";
    pub const IS_WEEKEND: &str = "is_weekend";

    pub const TARGET: &str = "co2e_observed_kg";

    pub const DRIVERS: [&str; 3] = [ELECTRICITY, DIESEL, OUTPUT];

    /// Base fields in contract order
    pub const BASE_FEATURES: [&str; 9] = [
        ELECTRICITY,
        DIESEL,
        OUTPUT,
        TEMPERATURE,
        EQUIPMENT_LOAD,
        SHIFT,
        HOUR,
        DAY_OF_WEEK,
        IS_WEEKEND,
    ];

    pub const CATEGORICAL: [&str; 1] = [SHIFT];

    /// Suffixes of the derived columns, in output order
    pub const DERIVED_SUFFIXES: [&str; 4] = ["lag1", "lag4", "roll4", "roll96"];

    /// Derived column name for a driver, e.g. `electricity_kwh_lag1`
    pub fn derived(driver: &str, suffix: &str) -> String {
        format!("{}_{}", driver, suffix)
    }

    /// True for `<driver>_lag<k>` and `<driver>_roll<n>` names
    pub fn is_derived(name: &str) -> bool {
        let Some((_, suffix)) = name.rsplit_once('_') else {
            return false;
        };
        let digits = suffix
            .strip_prefix("lag")
            .or_else(|| suffix.strip_prefix("roll"));
        matches!(digits, Some(d) if !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()))
    }

    pub fn is_categorical(name: &str) -> bool {
        CATEGORICAL.contains(&name)
    }

    /// Sort key giving base fields, then the target, then derived columns
    /// grouped by driver, then anything else
    pub fn rank(name: &str) -> usize {
        if let Some(i) = BASE_FEATURES.iter().position(|c| *c == name) {
            return i;
        }
        if name == TARGET {
            return BASE_FEATURES.len();
        }
        for (d, driver) in DRIVERS.iter().enumerate() {
            for (s, suffix) in DERIVED_SUFFIXES.iter().enumerate() {
                if name == derived(driver, suffix) {
                    return BASE_FEATURES.len() + 1 + d * DERIVED_SUFFIXES.len() + s;
                }
            }
        }
        usize::MAX
    }
}

/// Ordered feature contract plus target name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    schema_version: u32,
    features: Vec<String>,
    target: String,
    /// Features one-hot encoded instead of scaled
    #[serde(default)]
    categorical: Vec<String>,
}

impl SchemaRegistry {
    /// Registry over the sensor-log contract: `shift` is the only
    /// categorical column
    pub fn new(features: Vec<String>, target: impl Into<String>) -> Result<Self> {
        let categorical = features
            .iter()
            .filter(|name| columns::is_categorical(name))
            .cloned()
            .collect();
        let registry = Self {
            schema_version: SCHEMA_VERSION,
            features,
            target: target.into(),
            categorical,
        };
        registry.validate()?;
        Ok(registry)
    }

    /// Replace the categorical column set. Every entry must be a feature.
    pub fn with_categorical(mut self, categorical: Vec<String>) -> Result<Self> {
        self.categorical = categorical;
        self.validate()?;
        Ok(self)
    }

    /// Re-check invariants, used on registries read back from disk
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(EstimationError::FeatureSchema(
                "feature list is empty".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(self.features.len());
        for name in &self.features {
            if name.is_empty() {
                return Err(EstimationError::FeatureSchema(
                    "feature list contains an empty name".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(EstimationError::FeatureSchema(format!(
                    "feature '{}' is listed twice",
                    name
                )));
            }
        }
        if self.features.iter().any(|f| *f == self.target) {
            return Err(EstimationError::FeatureSchema(format!(
                "target '{}' is also listed as a feature",
                self.target
            )));
        }
        if let Some(name) = self.categorical.iter().find(|c| !seen.contains(c.as_str())) {
            return Err(EstimationError::FeatureSchema(format!(
                "categorical column '{}' is not a feature",
                name
            )));
        }
        Ok(())
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f == name)
    }

    pub fn categorical(&self) -> &[String] {
        &self.categorical
    }

    pub fn is_categorical(&self, name: &str) -> bool {
        self.categorical.iter().any(|c| c == name)
    }
}

/// The full feature list produced when every driver and base field is present
pub fn default_feature_list() -> Vec<String> {
    let mut features: Vec<String> = columns::BASE_FEATURES
        .iter()
        .map(|c| c.to_string())
        .collect();
    for driver in columns::DRIVERS {
        for suffix in columns::DERIVED_SUFFIXES {
            features.push(columns::derived(driver, suffix));
        }
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_feature_list() {
        let features = default_feature_list();
        assert_eq!(features.len(), 21);
        assert_eq!(features[0], "electricity_kwh");
        assert_eq!(features[9], "electricity_kwh_lag1");
        assert_eq!(features[20], "output_tons_roll96");
        assert!(SchemaRegistry::new(features, columns::TARGET).is_ok());
    }

    #[test]
    fn test_empty_schema_rejected() {
        let err = SchemaRegistry::new(vec![], columns::TARGET).unwrap_err();
        assert!(matches!(err, EstimationError::FeatureSchema(_)));
    }

    #[test]
    fn test_duplicate_feature_rejected() {
        let err = SchemaRegistry::new(vec!["a".into(), "a".into()], "y").unwrap_err();
        assert!(matches!(err, EstimationError::FeatureSchema(_)));
    }

    #[test]
    fn test_target_as_feature_rejected() {
        let err = SchemaRegistry::new(vec!["a".into(), "y".into()], "y").unwrap_err();
        assert!(matches!(err, EstimationError::FeatureSchema(_)));
    }

    #[test]
    fn test_column_rank_ordering() {
        assert!(columns::rank("shift") < columns::rank(columns::TARGET));
        assert!(columns::rank(columns::TARGET) < columns::rank("electricity_kwh_lag1"));
        assert!(columns::rank("electricity_kwh_roll96") < columns::rank("diesel_litres_lag1"));
        assert_eq!(columns::rank("something_else"), usize::MAX);
        assert!(columns::is_derived("output_tons_roll4"));
        assert!(columns::is_derived("diesel_litres_roll3"));
        assert!(!columns::is_derived("output_tons"));
        assert!(!columns::is_derived("output_tons_rollx"));
    }

    #[test]
    fn test_categorical_columns() {
        let schema =
            SchemaRegistry::new(vec!["shift".into(), "temp_c".into()], columns::TARGET).unwrap();
        assert!(schema.is_categorical("shift"));
        assert!(!schema.is_categorical("temp_c"));

        let table = SchemaRegistry::new(vec!["Region".into(), "Year".into()], "tons")
            .unwrap()
            .with_categorical(vec!["Region".into()])
            .unwrap();
        assert_eq!(table.categorical(), &["Region"]);

        let err = SchemaRegistry::new(vec!["Year".into()], "tons")
            .unwrap()
            .with_categorical(vec!["Region".into()])
            .unwrap_err();
        assert!(matches!(err, EstimationError::FeatureSchema(_)));
    }

    #[test]
    fn test_position_lookup() {
        let schema = SchemaRegistry::new(vec!["a".into(), "b".into()], "y").unwrap();
        assert_eq!(schema.position("b"), Some(1));
        assert_eq!(schema.position("c"), None);
        assert_eq!(schema.schema_version(), SCHEMA_VERSION);
    }
}
