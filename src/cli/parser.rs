//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::Parser;
use std::path::PathBuf;

/// tablefs: mount a relational database as a filesystem.
///
/// Tables appear as directories under the mount root; each row is a
/// regular file of `key=value` lines. Writing a row file back issues an
/// UPDATE against the originating row.
#[derive(Parser, Debug)]
#[command(name = "tablefs")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Data-source name for the backing database.
    ///
    /// A SQLite URI or plain path. Driver options ride in the query
    /// string, e.g. `file:app.db?_txlock=immediate`.
    #[arg(long, env = "TABLEFS_DSN", default_value = crate::store::DEFAULT_DSN)]
    pub dsn: String,

    /// Directory to mount the filesystem at (created if absent).
    #[arg(long, default_value = "./mnt/sqlitefs")]
    pub mountpoint: PathBuf,

    /// Database backend.
    #[arg(long, default_value = "sqlite")]
    pub backend: String,

    /// Trace FUSE callbacks to stderr.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub debug: bool,
}
