//! Feature engineering for sensor readings
//!
//! This module provides:
//! - Loading raw readings from CSV logs
//! - Per-site lag and rolling-mean features for every driver
//! - Calendar features derived from reading timestamps
//! - Cross-sectional tables read straight into training rows

mod engine;
mod source;
mod windows;


pub use engine::{engineer, EngineConfig, FeatureEngine, RAW_TARGET_ALIAS};
pub use source::{
    load_readings, load_table, parse_timestamp, read_readings, read_table, write_feature_rows, Table,
};
pub use windows::{lag, rolling_mean};
