//! Command line front end for simstore experiment directories
//!
//! Lists saved experiments, summarizes a loaded result store and writes
//! arranged tables as CSV.

pub mod commands;
pub mod config;
pub mod logging;

pub use config::Config;
pub use logging::init_logging;
