//! Binary entry point for tablefs.

#![allow(clippy::print_stderr)]

use clap::Parser;
use std::process::ExitCode;
use tablefs::cli::{execute, Cli};
use tracing::Level;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("FATAL {e}");
            ExitCode::FAILURE
        }
    }
}
