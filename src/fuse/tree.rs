//! In-memory inode tree backed by lazy database projection.
//!
//! Three node kinds mirror the filesystem surface: the mount root, one
//! directory per table, one regular file per row. Children are built the
//! first time their directory is opened and are never evicted, so the
//! table set and row set are fixed at first enumeration for the lifetime
//! of the mount. Schema or row changes in the database after that point
//! are not reflected.
//!
//! Row files are named `"1"`, `"2"`, ... `"N"` in the order the database
//! returned the rows; the name carries no column value.

use crate::codec;
use crate::error::{Result, TreeError};
use crate::resolver;
use crate::store::{Gateway, TableMeta};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::SystemTime;

/// Root directory inode (standard FUSE convention).
pub const ROOT_INO: u64 = 1;

/// Permission bits for directories.
pub const DIR_PERM: u16 = 0o755;

/// Permission bits for row files.
pub const FILE_PERM: u16 = 0o666;

/// Distinguishes directory entries from regular files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Root or table directory.
    Directory,
    /// Row file.
    File,
}

/// Attributes of one node, transport-agnostic.
#[derive(Debug, Clone)]
pub struct NodeAttr {
    /// Inode number.
    pub ino: u64,
    /// Directory or file.
    pub kind: EntryKind,
    /// Permission bits (no file-type bits).
    pub perm: u16,
    /// Payload length for files, 0 for directories.
    pub size: u64,
    /// Last modification timestamp.
    pub mtime: SystemTime,
}

/// One entry of a directory listing.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Child inode.
    pub ino: u64,
    /// Child name.
    pub name: String,
    /// Child kind.
    pub kind: EntryKind,
}

struct RootNode {
    mtime: SystemTime,
    /// `None` until the first directory open materialises the table set.
    children: Option<BTreeMap<String, u64>>,
}

struct TableNode {
    meta: Arc<TableMeta>,
    mtime: SystemTime,
    children: Option<BTreeMap<String, u64>>,
}

struct RowNode {
    name: String,
    /// Non-owning back-reference; the table directory outlives its rows.
    table_ino: u64,
    mtime: SystemTime,
    /// Current payload, exclusively owned and mutated only by `write`.
    data: Vec<u8>,
}

enum Node {
    Root(RootNode),
    Table(TableNode),
    Row(RowNode),
}

/// The inode tree driven by FUSE callbacks.
pub struct NodeTree {
    gateway: Arc<dyn Gateway>,
    nodes: HashMap<u64, Node>,
    next_ino: u64,
}

impl NodeTree {
    /// Creates a tree containing only the root directory.
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_INO,
            Node::Root(RootNode {
                mtime: SystemTime::now(),
                children: None,
            }),
        );
        Self {
            gateway,
            nodes,
            next_ino: ROOT_INO + 1,
        }
    }

    fn alloc_ino(&mut self) -> u64 {
        let ino = self.next_ino;
        self.next_ino += 1;
        ino
    }

    fn node(&self, ino: u64) -> Result<&Node> {
        self.nodes.get(&ino).ok_or_else(|| {
            TreeError::NotFound {
                name: format!("inode {ino}"),
            }
            .into()
        })
    }

    fn row(&self, ino: u64) -> Result<&RowNode> {
        match self.node(ino)? {
            Node::Row(row) => Ok(row),
            Node::Root(_) => Err(TreeError::NotAFile {
                name: "/".to_string(),
            }
            .into()),
            Node::Table(table) => Err(TreeError::NotAFile {
                name: table.meta.table.clone(),
            }
            .into()),
        }
    }

    fn row_mut(&mut self, ino: u64) -> Result<&mut RowNode> {
        match self.nodes.get_mut(&ino) {
            Some(Node::Row(row)) => Ok(row),
            Some(_) => Err(TreeError::NotAFile {
                name: format!("inode {ino}"),
            }
            .into()),
            None => Err(TreeError::NotFound {
                name: format!("inode {ino}"),
            }
            .into()),
        }
    }

    /// Returns the attributes of any known node.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown inode.
    pub fn getattr(&self, ino: u64) -> Result<NodeAttr> {
        let attr = match self.node(ino)? {
            Node::Root(root) => NodeAttr {
                ino,
                kind: EntryKind::Directory,
                perm: DIR_PERM,
                size: 0,
                mtime: root.mtime,
            },
            Node::Table(table) => NodeAttr {
                ino,
                kind: EntryKind::Directory,
                perm: DIR_PERM,
                size: 0,
                mtime: table.mtime,
            },
            Node::Row(row) => NodeAttr {
                ino,
                kind: EntryKind::File,
                perm: FILE_PERM,
                size: row.data.len() as u64,
                mtime: row.mtime,
            },
        };
        Ok(attr)
    }

    /// Opens a directory, materialising its children on first use, and
    /// returns the listing.
    ///
    /// Safe to call repeatedly; a child that already exists under a name
    /// is retained, never replaced.
    ///
    /// # Errors
    ///
    /// Returns `NotADirectory` for row files and propagates store errors
    /// raised during materialisation.
    pub fn open_dir(&mut self, ino: u64) -> Result<Vec<DirEntry>> {
        let child_kind = match self.node(ino)? {
            Node::Root(_) => {
                self.materialise_root()?;
                EntryKind::Directory
            }
            Node::Table(_) => {
                self.materialise_table(ino)?;
                EntryKind::File
            }
            Node::Row(row) => {
                return Err(TreeError::NotADirectory {
                    name: row.name.clone(),
                }
                .into())
            }
        };

        let children = match self.node(ino)? {
            Node::Root(root) => root.children.as_ref(),
            Node::Table(table) => table.children.as_ref(),
            Node::Row(_) => None,
        };
        let entries = children
            .into_iter()
            .flatten()
            .map(|(name, &child_ino)| DirEntry {
                ino: child_ino,
                name: name.clone(),
                kind: child_kind,
            })
            .collect();
        Ok(entries)
    }

    /// Resolves a child by name, materialising the parent if needed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no child carries the name, `NotADirectory`
    /// when the parent is a row file.
    pub fn lookup(&mut self, parent: u64, name: &str) -> Result<NodeAttr> {
        match self.node(parent)? {
            Node::Root(_) => self.materialise_root()?,
            Node::Table(_) => self.materialise_table(parent)?,
            Node::Row(row) => {
                return Err(TreeError::NotADirectory {
                    name: row.name.clone(),
                }
                .into())
            }
        }

        let children = match self.node(parent)? {
            Node::Root(root) => root.children.as_ref(),
            Node::Table(table) => table.children.as_ref(),
            Node::Row(_) => None,
        };
        let child_ino = children.and_then(|c| c.get(name)).copied().ok_or_else(|| {
            TreeError::NotFound {
                name: name.to_string(),
            }
        })?;
        self.getattr(child_ino)
    }

    /// Verifies that an inode names an openable row file.
    ///
    /// # Errors
    ///
    /// Returns `NotAFile` for directories, `NotFound` for unknown inodes.
    pub fn open_file(&self, ino: u64) -> Result<()> {
        self.row(ino).map(|_| ())
    }

    /// Reads from a row file's payload, honouring offset and length.
    ///
    /// # Errors
    ///
    /// Returns `NotAFile` for directories, `NotFound` for unknown inodes.
    pub fn read(&self, ino: u64, offset: i64, size: u32) -> Result<&[u8]> {
        let row = self.row(ino)?;
        let start = usize::try_from(offset).unwrap_or(0).min(row.data.len());
        let end = start.saturating_add(size as usize).min(row.data.len());
        Ok(&row.data[start..end])
    }

    /// Writes a full replacement payload to a row file.
    ///
    /// A write at offset zero carrying the current bytes is a no-op.
    /// Anything else is resolved against the current (old) payload; if the
    /// decoded maps differ, the resulting UPDATE runs against the store
    /// before the new bytes are accepted. On any failure the payload is
    /// left exactly as it was.
    ///
    /// # Errors
    ///
    /// Propagates `PrimaryKeyMissing` and store errors; returns
    /// `Unsupported` for tables without a declared primary key.
    pub fn write(&mut self, ino: u64, offset: i64, data: &[u8]) -> Result<usize> {
        let table_ino = {
            let row = self.row(ino)?;
            if offset == 0 && row.data == data {
                return Ok(data.len());
            }
            row.table_ino
        };

        let meta = match self.node(table_ino)? {
            Node::Table(table) => Arc::clone(&table.meta),
            _ => {
                return Err(TreeError::NotFound {
                    name: format!("inode {table_ino}"),
                }
                .into())
            }
        };

        let request = {
            let row = self.row(ino)?;
            resolver::resolve(&row.data, data, &meta)?
        };

        if let Some(request) = request {
            if request.where_pairs.is_empty() {
                return Err(TreeError::Unsupported {
                    operation: "update on a table without a primary key",
                }
                .into());
            }
            let affected = self.gateway.execute_update(&request)?;
            tracing::debug!("update {}: {} row(s) affected", meta.table, affected);
        }

        let len = data.len();
        self.row_mut(ino)?.data = data.to_vec();
        Ok(len)
    }

    /// Builds the table directories from schema introspection. Runs once;
    /// later calls see the populated child index and return immediately.
    fn materialise_root(&mut self) -> Result<()> {
        let materialised = matches!(
            self.node(ROOT_INO)?,
            Node::Root(RootNode {
                children: Some(_),
                ..
            })
        );
        if materialised {
            return Ok(());
        }

        let tables = self.gateway.list_tables()?;
        let mut metas = Vec::with_capacity(tables.len());
        for table in &tables {
            metas.push(self.gateway.table_meta(table)?);
        }

        let now = SystemTime::now();
        let mut children = BTreeMap::new();
        for meta in metas {
            if let Entry::Vacant(slot) = children.entry(meta.table.clone()) {
                let ino = self.alloc_ino();
                self.nodes.insert(
                    ino,
                    Node::Table(TableNode {
                        meta: Arc::new(meta),
                        mtime: now,
                        children: None,
                    }),
                );
                slot.insert(ino);
            }
        }

        if let Some(Node::Root(root)) = self.nodes.get_mut(&ROOT_INO) {
            root.children = Some(children);
        }
        Ok(())
    }

    /// Builds the row files of one table directory from a full scan.
    fn materialise_table(&mut self, ino: u64) -> Result<()> {
        let (meta, mtime) = match self.node(ino)? {
            Node::Table(table) => {
                if table.children.is_some() {
                    return Ok(());
                }
                (Arc::clone(&table.meta), table.mtime)
            }
            _ => {
                return Err(TreeError::NotADirectory {
                    name: format!("inode {ino}"),
                }
                .into())
            }
        };

        let scan = self.gateway.scan_rows(&meta.table)?;

        let mut children = BTreeMap::new();
        for (index, row) in scan.rows.iter().enumerate() {
            let name = (index + 1).to_string();
            let data = codec::encode(&scan.columns, row);
            if let Entry::Vacant(slot) = children.entry(name.clone()) {
                let child_ino = self.alloc_ino();
                self.nodes.insert(
                    child_ino,
                    Node::Row(RowNode {
                        name,
                        table_ino: ino,
                        mtime,
                        data,
                    }),
                );
                slot.insert(child_ino);
            }
        }

        if let Some(Node::Table(table)) = self.nodes.get_mut(&ino) {
            table.children = Some(children);
        }
        Ok(())
    }
}
