//! `SQLite` gateway implementation.
//!
//! Backs the projection engine with a single `rusqlite` connection. The
//! connection sits behind a mutex so the gateway can be shared across
//! transport threads, and every UPDATE runs inside a transaction whose
//! behaviour honours the DSN's `_txlock` option.

use crate::error::{Result, StoreError};
use crate::resolver::UpdateRequest;
use crate::store::traits::{Gateway, TableMeta, TableScan};
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection, TransactionBehavior};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed gateway.
///
/// # Examples
///
/// ```no_run
/// use tablefs::store::{Gateway, SqliteGateway};
///
/// let gateway = SqliteGateway::open("file:sqlite-fs.db").unwrap();
/// let tables = gateway.list_tables().unwrap();
/// ```
pub struct SqliteGateway {
    /// Connection guarded for cross-thread use; `rusqlite::Connection` is
    /// `Send` but not `Sync`.
    conn: Mutex<Connection>,
    /// Transaction behaviour for UPDATEs, from the DSN's `_txlock` option.
    txn_behavior: TransactionBehavior,
}

impl std::fmt::Debug for SqliteGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteGateway").finish_non_exhaustive()
    }
}

impl SqliteGateway {
    /// Opens a database from a data-source string.
    ///
    /// The DSN is a SQLite URI (`file:...`) or a plain path.
    /// Underscore-prefixed query parameters are driver-level options:
    /// `_txlock=immediate|exclusive|deferred` selects the locking mode for
    /// write transactions, anything else underscore-prefixed is accepted
    /// opaquely. Remaining query parameters stay in the URI handed to
    /// SQLite.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(dsn: &str) -> Result<Self> {
        let (uri, txn_behavior) = parse_dsn(dsn);
        let conn = Connection::open(uri)?;
        Ok(Self {
            conn: Mutex::new(conn),
            txn_behavior,
        })
    }

    /// Creates an in-memory database. Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            txn_behavior: TransactionBehavior::Deferred,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()).into())
    }

    /// Rejects table names that schema introspection does not know about.
    fn validate_table(conn: &Connection, table: &str) -> Result<()> {
        let known: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            params![table],
            |row| row.get(0),
        )?;
        if known {
            Ok(())
        } else {
            Err(StoreError::UnknownTable {
                table: table.to_string(),
            }
            .into())
        }
    }

    fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?)")?;
        let columns = stmt
            .query_map(params![table], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<String>, _>>()?;
        Ok(columns)
    }
}

impl Gateway for SqliteGateway {
    fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(tables)
    }

    fn table_meta(&self, table: &str) -> Result<TableMeta> {
        let conn = self.lock()?;
        // pk is the column's 1-based position within the primary key, so
        // ordering by it yields the key's declaration order.
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk")?;
        let primary_key = stmt
            .query_map(params![table], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(TableMeta {
            table: table.to_string(),
            primary_key,
        })
    }

    fn scan_rows(&self, table: &str) -> Result<TableScan> {
        let conn = self.lock()?;
        Self::validate_table(&conn, table)?;

        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| (*c).to_string()).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(text_of(row.get_ref(i)?));
            }
            rows.push(values);
        }

        Ok(TableScan { columns, rows })
    }

    fn execute_update(&self, request: &UpdateRequest) -> Result<usize> {
        if request.where_pairs.is_empty() {
            return Err(StoreError::Database(
                "update requires a non-empty WHERE clause".to_string(),
            )
            .into());
        }

        let mut conn = self.lock()?;
        Self::validate_table(&conn, &request.table)?;
        let columns = Self::table_columns(&conn, &request.table)?;
        for (column, _) in request.set_pairs.iter().chain(&request.where_pairs) {
            if !columns.contains(column) {
                return Err(StoreError::UnknownColumn {
                    table: request.table.clone(),
                    column: column.clone(),
                }
                .into());
            }
        }

        let set_clause = request
            .set_pairs
            .iter()
            .map(|(c, _)| format!("{} = ?", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let where_clause = request
            .where_pairs
            .iter()
            .map(|(c, _)| format!("{} = ?", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(&request.table),
            set_clause,
            where_clause
        );

        let values = request
            .set_pairs
            .iter()
            .chain(&request.where_pairs)
            .map(|(_, v)| v.as_str());

        let tx = conn.transaction_with_behavior(self.txn_behavior)?;
        let affected = tx.execute(&sql, params_from_iter(values))?;
        tx.commit()?;
        Ok(affected)
    }
}

/// Splits a DSN into the URI handed to SQLite and the transaction
/// behaviour requested by its driver-level options.
fn parse_dsn(dsn: &str) -> (String, TransactionBehavior) {
    let Some((base, query)) = dsn.split_once('?') else {
        return (dsn.to_string(), TransactionBehavior::Deferred);
    };

    let mut behavior = TransactionBehavior::Deferred;
    let mut kept = Vec::new();
    for param in query.split('&') {
        let (key, value) = param.split_once('=').unwrap_or((param, ""));
        if key == "_txlock" {
            behavior = match value {
                "immediate" => TransactionBehavior::Immediate,
                "exclusive" => TransactionBehavior::Exclusive,
                _ => TransactionBehavior::Deferred,
            };
        } else if !key.starts_with('_') {
            kept.push(param);
        }
        // Unrecognised underscore options are driver-level and pass
        // through opaquely: accepted here, never shown to SQLite.
    }

    let uri = if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    };
    (uri, behavior)
}

/// Double-quotes an identifier for textual interpolation into SQL.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Renders a column value as text.
fn text_of(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    fn setup() -> SqliteGateway {
        let gateway = SqliteGateway::in_memory().unwrap();
        {
            let conn = gateway.conn.lock().unwrap();
            conn.execute_batch(
                r"
                CREATE TABLE emp (id INTEGER PRIMARY KEY, name TEXT);
                CREATE TABLE dept (code TEXT PRIMARY KEY, label TEXT);
                CREATE TABLE link (a TEXT, b TEXT, note TEXT, PRIMARY KEY (b, a));
                CREATE TABLE log (msg TEXT);
                INSERT INTO emp VALUES (1, 'alice'), (2, 'bob');
                INSERT INTO link VALUES ('x', 'y', 'hi');
            ",
            )
            .unwrap();
        }
        gateway
    }

    #[test]
    fn test_list_tables_sorted() {
        let gateway = setup();
        let tables = gateway.list_tables().unwrap();
        assert_eq!(tables, vec!["dept", "emp", "link", "log"]);
    }

    #[test]
    fn test_list_tables_excludes_catalogues() {
        let gateway = SqliteGateway::in_memory().unwrap();
        {
            let conn = gateway.conn.lock().unwrap();
            // AUTOINCREMENT forces the sqlite_sequence catalogue into being.
            conn.execute_batch(
                r"
                CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT);
                INSERT INTO t (v) VALUES ('one');
            ",
            )
            .unwrap();
        }
        assert_eq!(gateway.list_tables().unwrap(), vec!["t"]);
    }

    #[test]
    fn test_table_meta_single_pk() {
        let gateway = setup();
        let meta = gateway.table_meta("emp").unwrap();
        assert_eq!(meta.table, "emp");
        assert_eq!(meta.primary_key, vec!["id"]);
    }

    #[test]
    fn test_table_meta_composite_pk_declaration_order() {
        let gateway = setup();
        // link declares PRIMARY KEY (b, a); declaration order must survive.
        let meta = gateway.table_meta("link").unwrap();
        assert_eq!(meta.primary_key, vec!["b", "a"]);
    }

    #[test]
    fn test_table_meta_without_pk_is_empty() {
        let gateway = setup();
        assert!(gateway.table_meta("log").unwrap().primary_key.is_empty());
    }

    #[test]
    fn test_scan_rows_columns_and_order() {
        let gateway = setup();
        let scan = gateway.scan_rows("emp").unwrap();
        assert_eq!(scan.columns, vec!["id", "name"]);
        assert_eq!(scan.rows.len(), 2);
        assert_eq!(scan.rows[0], vec!["1", "alice"]);
        assert_eq!(scan.rows[1], vec!["2", "bob"]);
    }

    #[test]
    fn test_scan_rows_coerces_values_to_text() {
        let gateway = SqliteGateway::in_memory().unwrap();
        {
            let conn = gateway.conn.lock().unwrap();
            conn.execute_batch(
                r"
                CREATE TABLE mixed (i INTEGER, r REAL, t TEXT, n TEXT);
                INSERT INTO mixed VALUES (42, 3.5, 'txt', NULL);
            ",
            )
            .unwrap();
        }
        let scan = gateway.scan_rows("mixed").unwrap();
        assert_eq!(scan.rows[0], vec!["42", "3.5", "txt", ""]);
    }

    #[test]
    fn test_scan_rows_unknown_table() {
        let gateway = setup();
        let err = gateway.scan_rows("nope").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Store(StoreError::UnknownTable { .. })
        ));
    }

    #[test]
    fn test_execute_update_changes_row() {
        let gateway = setup();
        let affected = gateway
            .execute_update(&UpdateRequest {
                table: "emp".to_string(),
                set_pairs: vec![pair("name", "ALICE")],
                where_pairs: vec![pair("id", "1")],
            })
            .unwrap();
        assert_eq!(affected, 1);

        let scan = gateway.scan_rows("emp").unwrap();
        assert_eq!(scan.rows[0], vec!["1", "ALICE"]);
        assert_eq!(scan.rows[1], vec!["2", "bob"]);
    }

    #[test]
    fn test_execute_update_composite_where() {
        let gateway = setup();
        let affected = gateway
            .execute_update(&UpdateRequest {
                table: "link".to_string(),
                set_pairs: vec![pair("note", "HI")],
                where_pairs: vec![pair("b", "y"), pair("a", "x")],
            })
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(gateway.scan_rows("link").unwrap().rows[0][2], "HI");
    }

    #[test]
    fn test_execute_update_zero_rows_is_not_an_error() {
        let gateway = setup();
        let affected = gateway
            .execute_update(&UpdateRequest {
                table: "emp".to_string(),
                set_pairs: vec![pair("name", "nobody")],
                where_pairs: vec![pair("id", "999")],
            })
            .unwrap();
        assert_eq!(affected, 0);
    }

    #[test]
    fn test_execute_update_rejects_unknown_identifiers() {
        let gateway = setup();

        let err = gateway
            .execute_update(&UpdateRequest {
                table: "emp; DROP TABLE emp".to_string(),
                set_pairs: vec![pair("name", "x")],
                where_pairs: vec![pair("id", "1")],
            })
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Store(StoreError::UnknownTable { .. })
        ));

        let err = gateway
            .execute_update(&UpdateRequest {
                table: "emp".to_string(),
                set_pairs: vec![pair("name = 'x' --", "x")],
                where_pairs: vec![pair("id", "1")],
            })
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Store(StoreError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_execute_update_rejects_empty_where() {
        let gateway = setup();
        let err = gateway
            .execute_update(&UpdateRequest {
                table: "log".to_string(),
                set_pairs: vec![pair("msg", "x")],
                where_pairs: vec![],
            })
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Store(StoreError::Database(_))
        ));
    }

    #[test]
    fn test_values_bind_as_parameters() {
        let gateway = setup();
        // A value full of SQL metacharacters lands verbatim in the row.
        let tricky = "x'; DROP TABLE emp; --";
        gateway
            .execute_update(&UpdateRequest {
                table: "emp".to_string(),
                set_pairs: vec![pair("name", tricky)],
                where_pairs: vec![pair("id", "2")],
            })
            .unwrap();
        let scan = gateway.scan_rows("emp").unwrap();
        assert_eq!(scan.rows[1][1], tricky);
    }

    #[test]
    fn test_parse_dsn_plain() {
        let (uri, behavior) = parse_dsn("file:sqlite-fs.db");
        assert_eq!(uri, "file:sqlite-fs.db");
        assert!(matches!(behavior, TransactionBehavior::Deferred));
    }

    #[test]
    fn test_parse_dsn_txlock_immediate() {
        let (uri, behavior) = parse_dsn("file:app.db?_txlock=immediate");
        assert_eq!(uri, "file:app.db");
        assert!(matches!(behavior, TransactionBehavior::Immediate));
    }

    #[test]
    fn test_parse_dsn_keeps_sqlite_params() {
        let (uri, behavior) = parse_dsn("file:app.db?mode=rw&_txlock=exclusive&cache=shared");
        assert_eq!(uri, "file:app.db?mode=rw&cache=shared");
        assert!(matches!(behavior, TransactionBehavior::Exclusive));
    }

    #[test]
    fn test_parse_dsn_drops_unknown_driver_options() {
        let (uri, behavior) = parse_dsn("file:app.db?_busy_timeout=5000");
        assert_eq!(uri, "file:app.db");
        assert!(matches!(behavior, TransactionBehavior::Deferred));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("emp"), "\"emp\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
