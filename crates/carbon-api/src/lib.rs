//! HTTP serving shell for the emissions estimator

pub mod api;
pub mod config;
