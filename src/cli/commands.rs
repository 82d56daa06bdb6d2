//! Mount command implementation.

use crate::cli::parser::Cli;
use crate::error::{Result, StoreError};
use crate::fuse;
use crate::store::SqliteGateway;
use std::sync::Arc;

/// Opens the selected backend and serves the mount until unmount.
///
/// # Errors
///
/// Returns an error if the backend is unknown, the database cannot be
/// opened, the mountpoint cannot be created, or mounting fails.
pub fn execute(cli: &Cli) -> Result<()> {
    let gateway = open_gateway(&cli.backend, &cli.dsn)?;

    std::fs::create_dir_all(&cli.mountpoint).map_err(|e| crate::error::Error::Config {
        message: format!("cannot create mountpoint {}: {e}", cli.mountpoint.display()),
    })?;

    fuse::mount(gateway, &cli.mountpoint)
}

/// Resolves the backend selector to a gateway.
fn open_gateway(backend: &str, dsn: &str) -> Result<Arc<dyn crate::store::Gateway>> {
    match backend {
        "sqlite" => Ok(Arc::new(SqliteGateway::open(dsn)?)),
        other => Err(StoreError::UnknownBackend {
            name: other.to_string(),
        }
        .into()),
    }
}
