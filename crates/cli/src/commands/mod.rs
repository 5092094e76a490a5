//! CLI command implementations

pub mod data;
pub mod model;
pub mod predict;
