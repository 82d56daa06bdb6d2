//! Gateway trait definition.
//!
//! Defines the narrow capability set the projection engine needs from a
//! relational store: enumerate tables, describe primary keys, scan rows,
//! execute a parameterised UPDATE. Everything else the database can do is
//! deliberately out of reach.

use crate::error::Result;
use crate::resolver::UpdateRequest;

/// Schema information needed to project one table into the filesystem.
///
/// Immutable after construction; shared by a table directory and all of
/// its row files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    /// Table name, as reported by schema introspection.
    pub table: String,
    /// Primary-key column names in declaration order. Empty when the table
    /// has no declared primary key (its rows are projected read-only).
    pub primary_key: Vec<String>,
}

/// The result of scanning a whole table.
///
/// Column names are reported once; every value is coerced to text. The
/// scan is materialised inside the gateway call so the underlying cursor
/// is released before this value is returned.
#[derive(Debug, Clone, Default)]
pub struct TableScan {
    /// Column names in the database's declared order.
    pub columns: Vec<String>,
    /// All rows, each a value per column in `columns` order.
    pub rows: Vec<Vec<String>>,
}

/// Capability boundary to a relational store.
///
/// Implementations are internally synchronised: one gateway is shared by
/// every node in the tree and may be called from any transport thread.
///
/// Table and column names fed back into [`Gateway::execute_update`] must
/// originate from [`Gateway::list_tables`] / [`Gateway::table_meta`]
/// results, never from untrusted input; implementations re-validate them
/// against the schema before interpolating identifiers into SQL.
pub trait Gateway: Send + Sync + std::fmt::Debug {
    /// Enumerates user-visible tables, excluding system catalogues.
    ///
    /// Order is implementation-defined but stable within one process.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue query fails.
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Returns the table's primary-key columns in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if introspection fails.
    fn table_meta(&self, table: &str) -> Result<TableMeta>;

    /// Scans every row of a table, coercing all values to text.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan query fails.
    fn scan_rows(&self, table: &str) -> Result<TableScan>;

    /// Executes a primary-key-qualified UPDATE.
    ///
    /// Values bind positionally: SET values first, WHERE values after.
    /// Returns the number of affected rows; zero is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an identifier fails schema validation or the
    /// statement fails to execute.
    fn execute_update(&self, request: &UpdateRequest) -> Result<usize>;
}
