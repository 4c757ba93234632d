//! Engine façade: binds named tables to their schemas, root pages, and
//! sequence counters, and translates [`Command`]s into B-tree and codec
//! calls.
//!
//! The façade owns the virtual disk and the in-memory catalog. B-tree handles
//! are transient: each operation opens a handle from the table's persisted
//! root id and folds any root change back into the catalog, so a rollback
//! only has to reload the catalog; there are no live handles to invalidate.

mod filter;
mod join;

use blockdev::{BlockDevice, FileDevice, MemDevice};
use btree::BTree;
use catalog::{Catalog, Column, TableMeta};
use command::{Assignment, ColumnDef, Command, JoinClause, WhereClause};
use common::{Config, DbError, DbResult, PageId, RowMap};
use types::Value;
use vdisk::VirtualDisk;

/// Result of executing one command.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// SELECT output: an ordered sequence of row maps.
    Rows(Vec<RowMap>),
    /// Human-readable status of a DDL, DML, or transaction command.
    Status(String),
}

impl QueryResult {
    pub fn rows(&self) -> Option<&[RowMap]> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            QueryResult::Status(_) => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<RowMap>> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            QueryResult::Status(_) => None,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            QueryResult::Rows(_) => None,
            QueryResult::Status(s) => Some(s),
        }
    }
}

fn status(message: impl Into<String>) -> DbResult<QueryResult> {
    Ok(QueryResult::Status(message.into()))
}

/// The embedded storage engine.
///
/// Single-threaded and fully synchronous; one instance assumes sole access to
/// its underlying block-device namespace.
pub struct Database {
    disk: VirtualDisk,
    catalog: Catalog,
}

impl Database {
    /// Open a file-backed engine per the configuration.
    pub fn open(config: &Config) -> DbResult<Self> {
        let device = FileDevice::open(&config.data_dir)?;
        Self::with_device(Box::new(device), config.cache_pages)
    }

    /// Open an ephemeral engine backed by process memory.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_device(Box::new(MemDevice::new()), Config::default().cache_pages)
    }

    /// Open over an arbitrary block device, reloading the persisted catalog.
    pub fn with_device(device: Box<dyn BlockDevice>, cache_pages: usize) -> DbResult<Self> {
        let mut disk = VirtualDisk::new(device, cache_pages)?;
        let catalog = Catalog::load(&mut disk)?;
        Ok(Self { disk, catalog })
    }

    /// Consume the engine, handing back the underlying device (e.g. to
    /// simulate a restart in tests).
    pub fn into_device(self) -> Box<dyn BlockDevice> {
        self.disk.into_device()
    }

    /// The engine's current view of the catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Execute one command to completion.
    pub fn execute(&mut self, command: Command) -> DbResult<QueryResult> {
        match command {
            Command::CreateTable { name, columns } => self.create_table(name, columns),
            Command::Insert {
                table,
                columns,
                values,
            } => self.insert(table, columns, values),
            Command::Select {
                table,
                join,
                filter,
            } => self.select(table, join, filter),
            Command::Update {
                table,
                assignments,
                filter,
            } => self.update(table, assignments, filter),
            Command::Delete { table, filter } => self.delete(table, filter),
            Command::Begin => {
                self.disk.begin()?;
                status("transaction started")
            }
            Command::Commit => {
                self.disk.commit()?;
                status("transaction committed")
            }
            Command::Rollback => self.rollback(),
        }
    }

    fn create_table(&mut self, name: String, columns: Vec<ColumnDef>) -> DbResult<QueryResult> {
        if self.catalog.contains(&name) {
            return Err(DbError::Schema(format!("table '{name}' already exists")));
        }

        let columns: Vec<Column> = columns
            .into_iter()
            .map(|def| Column {
                name: def.name,
                ty: def.ty,
                primary_key: def.primary_key,
            })
            .collect();

        // Validate the schema before allocating the root page.
        let mut meta = TableMeta::try_new(&name, columns, PageId::NULL)?;
        meta.root_page_id = self.disk.allocate_page()?;
        BTree::open(&mut self.disk, meta.root_page_id)?;

        self.catalog.add(meta)?;
        self.catalog.save(&mut self.disk)?;
        status(format!("table '{name}' created"))
    }

    fn insert(
        &mut self,
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Value>,
    ) -> DbResult<QueryResult> {
        let meta = self.catalog.table(&table)?.clone();

        // Lay the supplied values into per-column slots.
        let mut slots: Vec<Option<Value>> = vec![None; meta.columns.len()];
        match columns {
            None => {
                if values.len() != meta.columns.len() {
                    return Err(DbError::Schema(format!(
                        "table '{table}' has {} columns but {} values were supplied",
                        meta.columns.len(),
                        values.len()
                    )));
                }
                slots = values.into_iter().map(Some).collect();
            }
            Some(names) => {
                if names.len() != values.len() {
                    return Err(DbError::Schema(format!(
                        "{} columns named but {} values supplied",
                        names.len(),
                        values.len()
                    )));
                }
                for (name, value) in names.iter().zip(values) {
                    let idx = meta.column_index(name).ok_or_else(|| {
                        DbError::Schema(format!("column '{name}' not found in table '{table}'"))
                    })?;
                    if slots[idx].is_some() {
                        return Err(DbError::Schema(format!(
                            "column '{name}' specified more than once"
                        )));
                    }
                    slots[idx] = Some(value);
                }
            }
        }

        let pk_idx = meta.pk_index();
        let (key, new_root) = {
            let mut tree = BTree::open(&mut self.disk, meta.root_page_id)?;

            // An absent or NULL primary key takes the next auto-increment
            // value: one past both the sequence counter and the largest key
            // actually present.
            let key = match &slots[pk_idx] {
                None | Some(Value::Null) => tree.max_key()?.max(meta.seq) + 1,
                Some(Value::Int(i)) if *i >= 0 => *i as u32,
                Some(other) => {
                    return Err(DbError::Data(format!(
                        "invalid primary key value '{other}' for table '{table}'"
                    )));
                }
            };
            slots[pk_idx] = Some(Value::Int(key as i32));

            let mut row = Vec::with_capacity(meta.columns.len());
            for (column, slot) in meta.columns.iter().zip(slots) {
                let value = slot.ok_or_else(|| {
                    DbError::Data(format!("column '{}' has no value", column.name))
                })?;
                if value.is_null() {
                    return Err(DbError::Data(format!(
                        "column '{}' has no value",
                        column.name
                    )));
                }
                if !value.matches(column.ty) {
                    return Err(DbError::Schema(format!(
                        "type mismatch for column '{}': expected {}, got {value}",
                        column.name, column.ty
                    )));
                }
                row.push(value);
            }

            let encoded = codec::encode(&meta.columns, &row)?;
            tree.insert(key, &encoded)?;
            (key, tree.root())
        };

        let entry = self.catalog.table_mut(&table)?;
        entry.root_page_id = new_root;
        if key > entry.seq {
            entry.seq = key;
        }
        self.catalog.save(&mut self.disk)?;
        status("1 row inserted")
    }

    fn select(
        &mut self,
        table: String,
        join: Option<JoinClause>,
        filter: Option<WhereClause>,
    ) -> DbResult<QueryResult> {
        let meta = self.catalog.table(&table)?.clone();
        let mut rows = self.scan_table(&meta)?;

        if let Some(join) = join {
            let right_meta = self.catalog.table(&join.table)?.clone();
            let right_rows = self.scan_table(&right_meta)?;
            rows = join::nested_loop_join(&rows, &table, &right_rows, &join);
        }

        if let Some(clause) = filter {
            rows.retain(|row| filter::row_matches(row, &table, &clause));
        }
        Ok(QueryResult::Rows(rows))
    }

    fn update(
        &mut self,
        table: String,
        assignments: Vec<Assignment>,
        filter: Option<WhereClause>,
    ) -> DbResult<QueryResult> {
        let meta = self.catalog.table(&table)?.clone();
        let matching = self.matching_rows(&meta, filter.as_ref())?;

        let mut affected = 0usize;
        let new_root = {
            let mut tree = BTree::open(&mut self.disk, meta.root_page_id)?;
            for row in matching {
                let key = row_key(&meta, &row)?;
                let payload = tree.search(key)?.ok_or(DbError::KeyNotFound(key))?;
                let mut values = codec::decode(&meta.columns, &payload);
                if values.len() != meta.columns.len() {
                    return Err(DbError::Data(format!(
                        "row {key} in table '{table}' is missing trailing columns"
                    )));
                }

                for assignment in &assignments {
                    let idx = meta.column_index(&assignment.column).ok_or_else(|| {
                        DbError::Schema(format!(
                            "column '{}' not found in table '{table}'",
                            assignment.column
                        ))
                    })?;
                    let column = &meta.columns[idx];
                    if column.primary_key && assignment.value != values[idx] {
                        return Err(DbError::Schema(format!(
                            "cannot change primary key column '{}'",
                            column.name
                        )));
                    }
                    if assignment.value.is_null() {
                        return Err(DbError::Data(format!(
                            "column '{}' cannot be set to NULL",
                            column.name
                        )));
                    }
                    if !assignment.value.matches(column.ty) {
                        return Err(DbError::Schema(format!(
                            "type mismatch for column '{}': expected {}, got {}",
                            column.name, column.ty, assignment.value
                        )));
                    }
                    values[idx] = assignment.value.clone();
                }

                // Update is delete-then-insert at the same key.
                let encoded = codec::encode(&meta.columns, &values)?;
                tree.delete(key)?;
                tree.insert(key, &encoded)?;
                affected += 1;
            }
            tree.root()
        };

        if new_root != meta.root_page_id {
            self.catalog.table_mut(&table)?.root_page_id = new_root;
            self.catalog.save(&mut self.disk)?;
        }
        status(format!("{affected} row(s) updated"))
    }

    fn delete(&mut self, table: String, filter: Option<WhereClause>) -> DbResult<QueryResult> {
        let meta = self.catalog.table(&table)?.clone();
        let matching = self.matching_rows(&meta, filter.as_ref())?;

        let mut affected = 0usize;
        let mut tree = BTree::open(&mut self.disk, meta.root_page_id)?;
        for row in matching {
            tree.delete(row_key(&meta, &row)?)?;
            affected += 1;
        }
        status(format!("{affected} row(s) deleted"))
    }

    fn rollback(&mut self) -> DbResult<QueryResult> {
        self.disk.rollback()?;
        // Transactional catalog writes were discarded with the metadata
        // buffer; rebuild the façade from what the device actually holds.
        self.catalog = Catalog::load(&mut self.disk)?;
        status("transaction rolled back")
    }

    /// Scan and decode every row of a table, in primary-key order.
    fn scan_table(&mut self, meta: &TableMeta) -> DbResult<Vec<RowMap>> {
        let mut tree = BTree::open(&mut self.disk, meta.root_page_id)?;
        let entries = tree.scan_all()?;
        Ok(entries
            .iter()
            .map(|(_, payload)| {
                let values = codec::decode(&meta.columns, payload);
                meta.columns
                    .iter()
                    .zip(values)
                    .map(|(column, value)| (column.name.clone(), value))
                    .collect()
            })
            .collect())
    }

    /// Rows of `meta` passing the optional filter.
    fn matching_rows(
        &mut self,
        meta: &TableMeta,
        filter: Option<&WhereClause>,
    ) -> DbResult<Vec<RowMap>> {
        let mut rows = self.scan_table(meta)?;
        if let Some(clause) = filter {
            rows.retain(|row| filter::row_matches(row, &meta.name, clause));
        }
        Ok(rows)
    }
}

/// Extract a row's primary key as a B-tree key.
fn row_key(meta: &TableMeta, row: &RowMap) -> DbResult<u32> {
    row.get(&meta.pk_column)
        .and_then(Value::as_int)
        .filter(|key| *key >= 0)
        .map(|key| key as u32)
        .ok_or_else(|| {
            DbError::Data(format!(
                "row in table '{}' has no valid primary key",
                meta.name
            ))
        })
}
