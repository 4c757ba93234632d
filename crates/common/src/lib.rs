
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io, path::PathBuf};
use thiserror::Error;
use types::Value;

/// Size of a page in bytes, the quantum of I/O between the B-tree and the
/// block device.
pub const PAGE_SIZE: usize = 4096;

/// Logical identifier for a page in the storage layer.
///
/// Page id `0` is reserved as the null sentinel ("no parent", "no page");
/// real pages are numbered from `1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub u32);

impl PageId {
    pub const NULL: PageId = PageId(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// A fixed-size page buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub data: Vec<u8>,
}

impl Page {
    /// Create a new zeroed page.
    pub fn new() -> Self {
        Self {
            data: vec![0u8; PAGE_SIZE],
        }
    }

    /// Build a page from raw bytes, zero-padding or truncating to `PAGE_SIZE`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut page = Self::new();
        let n = bytes.len().min(PAGE_SIZE);
        page.data[..n].copy_from_slice(&bytes[..n]);
        page
    }

    /// Returns true if every byte of the page is zero.
    ///
    /// The B-tree treats an all-zero page as an uninitialized leaf.
    pub fn is_zeroed(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

/// Named projection of a decoded row, keyed by column name.
pub type RowMap = HashMap<String, Value>;

/// Canonical error type shared across the engine's subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    /// Schema-level violations: unknown tables or columns, primary-key rules,
    /// column-count and type mismatches.
    #[error("schema: {0}")]
    Schema(String),
    /// Row-level data violations: missing values, invalid primary keys,
    /// oversized TEXT.
    #[error("data: {0}")]
    Data(String),
    /// Catalog metadata could not be read or written.
    #[error("catalog: {0}")]
    Catalog(String),
    /// Backend or page-format failures.
    #[error("storage: {0}")]
    Storage(String),
    #[error("duplicate key {0}")]
    DuplicateKey(u32),
    #[error("key {0} not found")]
    KeyNotFound(u32),
    #[error("index page full")]
    IndexPageFull,
    #[error("transaction already active")]
    TransactionActive,
    #[error("no active transaction")]
    NoTransaction,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the engine.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .cache_pages(512)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Directory where the page file and metadata live.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Number of pages the virtual disk keeps resident in its cache.
    #[builder(default = 256)]
    pub cache_pages: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            cache_pages: 256,
        }
    }
}
