//! Core types for the charging-session analyzer.
//!
//! Holds the data model, error taxonomy, column resolution, scalar coercion
//! and the small numeric/time helpers shared by the ingestion and runtime
//! layers.

pub mod coercion;
pub mod config;
pub mod error;
pub mod fields;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod statistics;
pub mod time_utils;

pub use error::{AnalyticsError, Result};
