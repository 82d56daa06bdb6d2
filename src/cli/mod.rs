//! CLI layer for tablefs.
//!
//! Argument parsing with clap and the mount entrypoint.

pub mod commands;
pub mod parser;

pub use commands::execute;
pub use parser::Cli;
