//! File I/O for solver inputs and results.
//!
//! Configurations, restart states and reports are stored as JSON.

pub mod json;

pub use json::{read_config, read_report, read_state, write_config, write_report, write_state};
