//! Result storage for agent-based simulations
//!
//! This crate persists the output of simulation experiments and reshapes it
//! for analysis. It supports:
//! - A keyed result store of tables, structured values and nested stores
//! - Saving an experiment to a numbered directory of CSV and JSON files
//! - Loading an experiment back, skipping files that cannot be read
//! - Arranging variables, measures and parameters into one flat table
//!
//! # Example
//!
//! ```ignore
//! use simstore_core::{ArrangeOptions, LoadOptions, Selection, load};
//!
//! let report = load(&LoadOptions::new("ap_output").name("virus"))?;
//! for warning in &report.warnings {
//!     eprintln!("{}: {}", warning.file, warning.error);
//! }
//!
//! let table = report
//!     .store
//!     .arrange_variables(&ArrangeOptions::new().obj_types(Selection::only(["Person"])))?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod arrange;
pub mod combine;
pub mod error;
pub mod persist;
pub mod store;

// ============================================================================
// Data modules
// ============================================================================

pub mod csv;
pub mod selection;
pub mod table;
pub mod value;

mod util;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use arrange::ArrangeOptions;
pub use error::{Result, StoreError};
pub use persist::{
    DEFAULT_OUTPUT_PATH, ExperimentDir, FileWarning, LoadOptions, LoadReport, SaveOptions,
    SaveReport, list_experiments, load,
};
pub use selection::{ParameterSelection, RunAlignment, Selection};
pub use store::{Entry, ResultStore};
pub use table::{Column, Table};
pub use value::Value;
