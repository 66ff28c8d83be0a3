//! Command-line interface for finscan.

mod commands;

pub use commands::{is_verbose, run};
