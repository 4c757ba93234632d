//! Persisted catalog: the set of known tables, their schemas, B-tree root
//! page ids, and auto-increment counters.
//!
//! The whole catalog is serialized as one JSON array under the metadata key
//! `tables` and rewritten whenever a table is created or a table's counter or
//! root moves. Entries are decoded independently on load so one corrupted
//! record (e.g. a missing column list) is skipped with a warning instead of
//! taking the engine down.

use ahash::RandomState;
use common::{DbError, DbResult, PageId};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use types::SqlType;
use vdisk::VirtualDisk;

type Map<K, V> = HashMap<K, V, RandomState>;

const TABLES_META_KEY: &str = "tables";

/// Describes a logical column within a table schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SqlType,
    #[serde(rename = "isPrimaryKey", default, skip_serializing_if = "is_false")]
    pub primary_key: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Column {
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
            primary_key: false,
        }
    }

    /// An INTEGER primary-key column.
    pub fn primary_key(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: SqlType::Integer,
            primary_key: true,
        }
    }
}

/// Metadata describing a registered table: its schema, the page id of its
/// B-tree root, and the auto-increment counter `seq`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(rename = "pkColumn")]
    pub pk_column: String,
    #[serde(rename = "rootPageId")]
    pub root_page_id: PageId,
    pub seq: u32,
}

impl TableMeta {
    /// Validate a column list and build the table record.
    ///
    /// Requires a unique set of column names with exactly one primary key,
    /// and that key's type must be INTEGER.
    pub fn try_new(
        name: impl Into<String>,
        columns: Vec<Column>,
        root_page_id: PageId,
    ) -> DbResult<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(DbError::Schema(format!(
                "table '{name}' must have at least one column"
            )));
        }

        let mut seen = Map::default();
        for column in &columns {
            if seen.insert(column.name.clone(), ()).is_some() {
                return Err(DbError::Schema(format!(
                    "duplicate column '{}' in table '{name}'",
                    column.name
                )));
            }
        }

        let mut pks = columns.iter().filter(|c| c.primary_key);
        let pk = pks.next().ok_or_else(|| {
            DbError::Schema(format!("table '{name}' has no primary key column"))
        })?;
        if pks.next().is_some() {
            return Err(DbError::Schema(format!(
                "table '{name}' declares more than one primary key"
            )));
        }
        if pk.ty != SqlType::Integer {
            return Err(DbError::Schema(format!(
                "primary key column '{}' must be INTEGER",
                pk.name
            )));
        }

        Ok(Self {
            name,
            pk_column: pk.name.clone(),
            columns,
            root_page_id,
            seq: 0,
        })
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Ordinal of the primary-key column.
    pub fn pk_index(&self) -> usize {
        self.columns
            .iter()
            .position(|c| c.name == self.pk_column)
            .unwrap_or(0)
    }
}

/// The set of known tables, indexed by name.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: Vec<TableMeta>,
    name_index: Map<String, usize>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the catalog from the `tables` metadata blob.
    ///
    /// A record that fails to decode is a corruption advisory: it is logged
    /// and skipped, never fatal.
    pub fn load(disk: &mut VirtualDisk) -> DbResult<Self> {
        let Some(blob) = disk.get_meta(TABLES_META_KEY)? else {
            return Ok(Self::empty());
        };
        let entries = blob
            .as_array()
            .ok_or_else(|| DbError::Catalog(format!("'{TABLES_META_KEY}' is not a list")))?;

        let mut catalog = Self::empty();
        for entry in entries {
            match serde_json::from_value::<TableMeta>(entry.clone()) {
                Ok(table) => catalog.tables.push(table),
                Err(e) => warn!(error = %e, "skipping corrupted catalog entry"),
            }
        }
        catalog.rebuild_index();
        Ok(catalog)
    }

    /// Persist the full table list back to the metadata store.
    pub fn save(&self, disk: &mut VirtualDisk) -> DbResult<()> {
        let blob = serde_json::to_value(&self.tables)
            .map_err(|e| DbError::Catalog(format!("serialize failed: {e}")))?;
        disk.set_meta(TABLES_META_KEY, blob)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn table(&self, name: &str) -> DbResult<&TableMeta> {
        self.name_index
            .get(name)
            .and_then(|&idx| self.tables.get(idx))
            .ok_or_else(|| DbError::Schema(format!("table '{name}' not found")))
    }

    pub fn table_mut(&mut self, name: &str) -> DbResult<&mut TableMeta> {
        let idx = *self
            .name_index
            .get(name)
            .ok_or_else(|| DbError::Schema(format!("table '{name}' not found")))?;
        self.tables
            .get_mut(idx)
            .ok_or_else(|| DbError::Schema(format!("table '{name}' not found")))
    }

    /// Register a new table.
    pub fn add(&mut self, table: TableMeta) -> DbResult<()> {
        if self.contains(&table.name) {
            return Err(DbError::Schema(format!(
                "table '{}' already exists",
                table.name
            )));
        }
        self.name_index
            .insert(table.name.clone(), self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableMeta> {
        self.tables.iter()
    }

    fn rebuild_index(&mut self) {
        self.name_index.clear();
        for (idx, table) in self.tables.iter().enumerate() {
            self.name_index.insert(table.name.clone(), idx);
        }
    }
}
