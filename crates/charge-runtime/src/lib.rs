//! Runtime layer for the charge analyzer.
//!
//! Loads export files asynchronously, runs the analysis pipeline for several
//! files at once and keeps finished results in an injected store.

pub mod runner;
pub mod store;

pub use charge_core as core;
pub use charge_data as data;
