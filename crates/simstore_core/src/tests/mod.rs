//! Integration tests for the simstore result layer
//!
//! Tests are organized by topic:
//! - `roundtrip` - Saving an experiment and loading it back
//! - `arrange` - Arranging multi-run and multi-iteration experiments
