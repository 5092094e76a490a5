//! Temporal feature engine
//!
//! Turns raw, site-partitioned sensor readings into engineered feature rows:
//! canonical column names, calendar fields, and per-site lag and rolling-mean
//! features for every driver. The same code path serves training and the
//! `engineer` CLI command, so the derived columns are identical in both.

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::windows::{lag, rolling_mean};
use crate::models::{FeatureRow, FeatureValue, RawValue, Reading};
use crate::schema::columns;

/// Raw alias of the target column in the simulated IoT logs
pub const RAW_TARGET_ALIAS: &str = "co2e_estimated_kg";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Site used when a reading carries no site id
    pub default_site: String,
    /// Numeric drivers that receive lag/rolling features
    pub drivers: Vec<String>,
    /// Lag offsets, in readings
    pub lags: Vec<usize>,
    /// Rolling-mean window sizes, in readings
    pub windows: Vec<usize>,
    /// Minimum readings a rolling window needs before it yields a value
    pub min_periods: usize,
    /// Raw column name to canonical column name
    pub renames: Vec<(String, String)>,
    /// Target column name after renaming
    pub target: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_site: columns::DEFAULT_SITE.to_string(),
            drivers: columns::DRIVERS.iter().map(|d| d.to_string()).collect(),
            lags: vec![1, 4],
            windows: vec![4, 96],
            min_periods: 1,
            renames: vec![
                ("energy_usage_kwh".into(), columns::ELECTRICITY.into()),
                ("fuel_liters".into(), columns::DIESEL.into()),
                ("temperature_c".into(), columns::TEMPERATURE.into()),
                ("equipment_load_%".into(), columns::EQUIPMENT_LOAD.into()),
                ("shift_id".into(), columns::SHIFT.into()),
                (RAW_TARGET_ALIAS.into(), columns::TARGET.into()),
            ],
            target: columns::TARGET.to_string(),
        }
    }
}

/// Reading after renaming, before filling
struct Normalized {
    site_id: String,
    timestamp: chrono::DateTime<chrono::FixedOffset>,
    values: BTreeMap<String, RawValue>,
}

/// Derives engineered feature rows from raw readings
#[derive(Debug, Clone, Default)]
pub struct FeatureEngine {
    config: EngineConfig,
}

impl FeatureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Column names derived for one driver, in output order
    pub fn derived_columns(&self, driver: &str) -> Vec<String> {
        let lags = self
            .config
            .lags
            .iter()
            .map(|k| columns::derived(driver, &format!("lag{}", k)));
        let rolls = self
            .config
            .windows
            .iter()
            .map(|w| columns::derived(driver, &format!("roll{}", w)));
        lags.chain(rolls).collect()
    }

    /// Engineer the full feature frame. Output rows are ordered by
    /// (site, timestamp).
    pub fn engineer(&self, readings: &[Reading]) -> Vec<FeatureRow> {
        if readings.is_empty() {
            return Vec::new();
        }

        let normalized: Vec<Normalized> = readings.iter().map(|r| self.normalize(r)).collect();

        let present: BTreeSet<String> = normalized
            .iter()
            .flat_map(|r| r.values.keys().cloned())
            .collect();
        let has_target = present.contains(&self.config.target);

        let before = normalized.len();
        let mut kept: Vec<Normalized> = if has_target {
            normalized
                .into_iter()
                .filter(|r| {
                    r.values
                        .get(&self.config.target)
                        .map(|v| !v.is_missing())
                        .unwrap_or(false)
                })
                .collect()
        } else {
            normalized
        };
        if kept.len() < before {
            info!(
                dropped = before - kept.len(),
                target = %self.config.target,
                "Dropped readings without a target value"
            );
        }

        // Stable sort: equal (site, timestamp) pairs keep their input order
        kept.sort_by(|a, b| {
            a.site_id
                .cmp(&b.site_id)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });

        let mut rows: Vec<FeatureRow> = kept.iter().map(|r| self.base_row(r, &present)).collect();

        let drivers: Vec<&String> = self
            .config
            .drivers
            .iter()
            .filter(|d| present.contains(*d))
            .collect();

        for (start, end) in partitions(&rows) {
            for driver in &drivers {
                let series: Vec<f64> = rows[start..end]
                    .iter()
                    .map(|row| row.number(driver).unwrap_or(0.0))
                    .collect();
                self.derive_driver(&mut rows[start..end], driver, &series);
            }
        }

        debug!(
            input_rows = readings.len(),
            output_rows = rows.len(),
            drivers = drivers.len(),
            "Feature engineering complete"
        );
        rows
    }

    fn normalize(&self, reading: &Reading) -> Normalized {
        let mut values = BTreeMap::new();
        for (name, value) in &reading.values {
            let canonical = self
                .config
                .renames
                .iter()
                .find(|(raw, _)| raw == name)
                .map(|(_, canonical)| canonical.clone());
            match canonical {
                // An explicit canonical column wins over its raw alias
                Some(canonical) if reading.values.contains_key(&canonical) => {}
                Some(canonical) => {
                    values.insert(canonical, value.clone());
                }
                None => {
                    values.insert(name.clone(), value.clone());
                }
            }
        }
        let site_id = reading
            .site_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.config.default_site.as_str())
            .to_string();
        Normalized {
            site_id,
            timestamp: reading.timestamp,
            values,
        }
    }

    /// Base fields, target and calendar fields of one reading with missing
    /// values filled with zero
    fn base_row(&self, reading: &Normalized, present: &BTreeSet<String>) -> FeatureRow {
        let mut values = BTreeMap::new();
        let missing = RawValue::Missing;

        for name in columns::BASE_FEATURES {
            if !present.contains(name) {
                continue;
            }
            let raw = reading.values.get(name).unwrap_or(&missing);
            let value = if columns::is_categorical(name) {
                FeatureValue::Category(raw.coerce_category())
            } else {
                FeatureValue::Number(raw.coerce_f64())
            };
            values.insert(name.to_string(), value);
        }
        for name in &self.config.drivers {
            if present.contains(name) && !values.contains_key(name) {
                let raw = reading.values.get(name).unwrap_or(&missing);
                values.insert(name.clone(), FeatureValue::Number(raw.coerce_f64()));
            }
        }
        if present.contains(&self.config.target) {
            let raw = reading.values.get(&self.config.target).unwrap_or(&missing);
            values.insert(
                self.config.target.clone(),
                FeatureValue::Number(raw.coerce_f64()),
            );
        }

        let dow = reading.timestamp.weekday().num_days_from_monday();
        values.insert(
            columns::HOUR.to_string(),
            FeatureValue::Number(reading.timestamp.hour() as f64),
        );
        values.insert(columns::DAY_OF_WEEK.to_string(), FeatureValue::Number(dow as f64));
        values.insert(
            columns::IS_WEEKEND.to_string(),
            FeatureValue::Number(if dow >= 5 { 1.0 } else { 0.0 }),
        );

        FeatureRow {
            site_id: reading.site_id.clone(),
            timestamp: reading.timestamp,
            values,
        }
    }

    fn derive_driver(&self, rows: &mut [FeatureRow], driver: &str, series: &[f64]) {
        let mut derived: Vec<(String, Vec<Option<f64>>)> = Vec::new();
        for k in &self.config.lags {
            derived.push((
                columns::derived(driver, &format!("lag{}", k)),
                lag(series, *k),
            ));
        }
        for w in &self.config.windows {
            derived.push((
                columns::derived(driver, &format!("roll{}", w)),
                rolling_mean(series, *w, self.config.min_periods),
            ));
        }
        for (name, values) in derived {
            for (row, value) in rows.iter_mut().zip(values) {
                let filled = value.filter(|v| v.is_finite()).unwrap_or(0.0);
                row.values.insert(name.clone(), FeatureValue::Number(filled));
            }
        }
    }
}

/// Contiguous `[start, end)` ranges sharing a site id
fn partitions(rows: &[FeatureRow]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for i in 1..=rows.len() {
        if i == rows.len() || rows[i].site_id != rows[start].site_id {
            ranges.push((start, i));
            start = i;
        }
    }
    ranges
}

/// Engineer features with the default configuration
pub fn engineer(readings: &[Reading]) -> Vec<FeatureRow> {
    FeatureEngine::new().engineer(readings)
}
