//! Command-line interface for bandwise

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::Output;
