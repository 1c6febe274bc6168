//! Ingestion and analytics layer for the charging-session analyzer.
//!
//! Reads delimited-text and spreadsheet exports, normalizes their rows into
//! canonical sessions, and runs the efficiency, ranking, hourly-pattern and
//! power-class passes that make up an [`AnalysisResult`](charge_core::models::AnalysisResult).

pub mod aggregator;
pub mod analysis;
pub mod analyzer;
pub mod normalizer;
pub mod reader;

pub use charge_core as core;
