//! # tablefs
//!
//! Mount a relational database as a filesystem.
//!
//! Each table of the backing database appears as a directory under the
//! mount root; each row appears as a regular file whose content is one
//! `key=value` line per column. Editing a file and writing it back
//! translates the difference between the old and new content into a
//! primary-key-qualified UPDATE against the originating row.
//!
//! ## Components
//!
//! - **`store`**: the [`store::Gateway`] capability boundary and its
//!   SQLite implementation
//! - **`codec`**: the row <-> `key=value` payload codec
//! - **`resolver`**: change detection turning a file rewrite into an
//!   [`resolver::UpdateRequest`]
//! - **`fuse`**: the in-memory inode tree and the FUSE adapter driving it

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for libc uid/gid calls in the FUSE adapter
#![warn(unsafe_code)]

pub mod cli;
pub mod codec;
pub mod error;
pub mod fuse;
pub mod resolver;
pub mod store;

// Re-export commonly used types at crate root
pub use error::{Error, ResolveError, Result, StoreError, TreeError};

pub use fuse::tree::{NodeTree, ROOT_INO};
pub use fuse::{mount, TableFs};
pub use resolver::UpdateRequest;
pub use store::{Gateway, SqliteGateway, TableMeta, TableScan, DEFAULT_DSN};

pub use cli::Cli;
