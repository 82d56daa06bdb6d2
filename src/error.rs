//! Error types for tablefs operations.
//!
//! Provides the error hierarchy using `thiserror`, covering the store
//! gateway, the change resolver, and the node tree, plus the mapping from
//! error values onto FUSE status codes.

use thiserror::Error;

/// Result type alias for tablefs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for tablefs operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database gateway errors.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Change resolution errors (file rewrite -> UPDATE).
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Node tree errors (lookup, unsupported operations).
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Mount or startup configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },
}

/// Errors raised by the database gateway.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Driver-level connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Backend selector did not name a known backend.
    #[error("unknown backend: {name}")]
    UnknownBackend {
        /// The backend name that was requested.
        name: String,
    },

    /// A table name that did not come from schema introspection.
    #[error("unknown table: {table}")]
    UnknownTable {
        /// The table name that was rejected.
        table: String,
    },

    /// A column name that did not come from schema introspection.
    #[error("unknown column: {table}.{column}")]
    UnknownColumn {
        /// Table the column was checked against.
        table: String,
        /// The column name that was rejected.
        column: String,
    },
}

/// Errors raised while resolving a file rewrite into an UPDATE.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The old payload does not carry a value for a primary-key column.
    #[error("{table}: pk {column} is not found")]
    PrimaryKeyMissing {
        /// Table whose row identity could not be reconstructed.
        table: String,
        /// The missing primary-key column.
        column: String,
    },
}

/// Errors raised by node tree operations.
#[derive(Error, Debug)]
pub enum TreeError {
    /// No child with the given name, or no node with the given inode.
    #[error("not found: {name}")]
    NotFound {
        /// The name or inode that failed to resolve.
        name: String,
    },

    /// Directory operation on a row file.
    #[error("not a directory: {name}")]
    NotADirectory {
        /// Name of the node.
        name: String,
    },

    /// File operation on a directory.
    #[error("not a file: {name}")]
    NotAFile {
        /// Name of the node.
        name: String,
    },

    /// Operation the projection does not support (create, unlink, ...).
    #[error("unsupported operation: {operation}")]
    Unsupported {
        /// Name of the rejected operation.
        operation: &'static str,
    },
}

impl Error {
    /// Maps an error onto the FUSE status code surfaced to the kernel.
    ///
    /// Recoverable per-request errors become errno values; anything the
    /// kernel has no better word for is an I/O error.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::Tree(TreeError::NotFound { .. }) => libc::ENOENT,
            Self::Tree(TreeError::NotADirectory { .. }) => libc::ENOTDIR,
            Self::Tree(TreeError::NotAFile { .. }) => libc::EISDIR,
            Self::Tree(TreeError::Unsupported { .. }) => libc::EPERM,
            Self::Store(_) | Self::Resolve(_) | Self::Config { .. } => libc::EIO,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Database("disk I/O error".to_string());
        assert_eq!(err.to_string(), "database error: disk I/O error");

        let err = StoreError::UnknownBackend {
            name: "postgres".to_string(),
        };
        assert_eq!(err.to_string(), "unknown backend: postgres");

        let err = StoreError::UnknownColumn {
            table: "emp".to_string(),
            column: "salry".to_string(),
        };
        assert_eq!(err.to_string(), "unknown column: emp.salry");
    }

    #[test]
    fn test_resolve_error_display() {
        let err = ResolveError::PrimaryKeyMissing {
            table: "emp".to_string(),
            column: "id".to_string(),
        };
        assert_eq!(err.to_string(), "emp: pk id is not found");
    }

    #[test]
    fn test_errno_mapping() {
        let not_found: Error = TreeError::NotFound {
            name: "3".to_string(),
        }
        .into();
        assert_eq!(not_found.errno(), libc::ENOENT);

        let unsupported: Error = TreeError::Unsupported { operation: "mkdir" }.into();
        assert_eq!(unsupported.errno(), libc::EPERM);

        let pk: Error = ResolveError::PrimaryKeyMissing {
            table: "emp".to_string(),
            column: "id".to_string(),
        }
        .into();
        assert_eq!(pk.errno(), libc::EIO);

        let store: Error = StoreError::Database("locked".to_string()).into();
        assert_eq!(store.errno(), libc::EIO);
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::Store(StoreError::Database(_))));

        let err: StoreError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
