//! Virtual disk: an in-memory page cache over a block device, a page
//! allocator, and the transaction buffer providing atomic commit/rollback.
//!
//! The cache is write-through, so eviction never loses data. While a
//! transaction is active, every page and metadata write lands in a buffer
//! instead; `commit` replays the buffer through the write-through path and
//! `rollback` discards it. Reads always consult the buffer first, so a
//! transaction observes its own pending writes.
//!
//! At most one transaction is active at a time. The layers above (B-tree, row
//! codec) are unaware of transactions and always see a consistent page view.


use ahash::RandomState;
use blockdev::BlockDevice;
use common::{DbError, DbResult, Page, PageId};
use hashbrown::HashMap;
use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::{debug, trace};

type Map<K, V> = HashMap<K, V, RandomState>;

const MAX_PAGE_ID_KEY: &str = "max_page_id";

/// Buffered writes of one active transaction.
///
/// Both maps hold defensive copies; they are destroyed wholesale on commit or
/// rollback.
#[derive(Debug, Default)]
struct TxState {
    pages: Map<PageId, Page>,
    meta: Map<String, serde_json::Value>,
}

/// Transactional page cache and allocator over a [`BlockDevice`].
pub struct VirtualDisk {
    device: Box<dyn BlockDevice>,
    cache: LruCache<PageId, Page>,
    /// Highest page id ever allocated; persisted under `max_page_id`.
    max_page_id: u32,
    tx: Option<TxState>,
}

impl VirtualDisk {
    /// Wrap a block device, loading the persisted allocation counter.
    ///
    /// # Panics
    ///
    /// Panics if `cache_pages` is 0.
    pub fn new(device: Box<dyn BlockDevice>, cache_pages: usize) -> DbResult<Self> {
        assert!(cache_pages > 0, "cache_pages must be > 0");
        let mut disk = Self {
            device,
            cache: LruCache::new(NonZeroUsize::new(cache_pages).unwrap()),
            max_page_id: 0,
            tx: None,
        };
        disk.max_page_id = disk.load_max_page_id()?;
        Ok(disk)
    }

    /// Returns true while a transaction is active.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Read a page: transaction buffer first, then cache, then the device.
    ///
    /// An id never written anywhere reads as a fresh zero page (cached, but
    /// not persisted until written).
    pub fn read_page(&mut self, id: PageId) -> DbResult<Page> {
        if let Some(tx) = &self.tx
            && let Some(page) = tx.pages.get(&id)
        {
            return Ok(page.clone());
        }

        if let Some(page) = self.cache.get(&id) {
            return Ok(page.clone());
        }

        let page = self.device.read_page(id)?;
        self.cache.put(id, page.clone());
        Ok(page)
    }

    /// Write a page.
    ///
    /// During a transaction the bytes are buffered (a defensive copy) and the
    /// cache and device are untouched. Outside a transaction the write goes
    /// through to both, and the allocation counter is advanced past `id` if
    /// necessary.
    pub fn write_page(&mut self, id: PageId, page: &Page) -> DbResult<()> {
        if let Some(tx) = &mut self.tx {
            tx.pages.insert(id, page.clone());
            return Ok(());
        }

        self.cache.put(id, page.clone());
        self.device.write_page(id, page)?;
        if id.0 > self.max_page_id {
            self.max_page_id = id.0;
            self.persist_max_page_id()?;
        }
        Ok(())
    }

    /// Allocate a fresh page id, guaranteed never to collide with any id
    /// previously allocated in this database's lifetime.
    ///
    /// Outside a transaction the new counter is persisted immediately; inside
    /// one it is held in memory and persisted on commit (rollback reloads the
    /// old counter, undoing the allocation).
    pub fn allocate_page(&mut self) -> DbResult<PageId> {
        self.max_page_id += 1;
        let id = PageId(self.max_page_id);
        if self.tx.is_none() {
            self.persist_max_page_id()?;
        }
        trace!(page = id.0, "allocated page");
        Ok(id)
    }

    /// Read a metadata value, consulting the transaction buffer first.
    pub fn get_meta(&mut self, key: &str) -> DbResult<Option<serde_json::Value>> {
        if let Some(tx) = &self.tx
            && let Some(value) = tx.meta.get(key)
        {
            return Ok(Some(value.clone()));
        }
        self.device.get_meta(key)
    }

    /// Write a metadata value: buffered during a transaction, through to the
    /// device otherwise.
    pub fn set_meta(&mut self, key: &str, value: serde_json::Value) -> DbResult<()> {
        if let Some(tx) = &mut self.tx {
            tx.meta.insert(key.to_string(), value);
            return Ok(());
        }
        self.device.set_meta(key, value)
    }

    /// Start a transaction.
    pub fn begin(&mut self) -> DbResult<()> {
        if self.tx.is_some() {
            return Err(DbError::TransactionActive);
        }
        self.tx = Some(TxState::default());
        debug!("transaction started");
        Ok(())
    }

    /// Commit the active transaction: replay buffered pages through the
    /// write-through path, then buffered metadata, then persist the
    /// allocation counter.
    ///
    /// Commit is atomic against rollback, not against process crashes midway
    /// through the device writes.
    pub fn commit(&mut self) -> DbResult<()> {
        let tx = self.tx.take().ok_or(DbError::NoTransaction)?;

        let pages = tx.pages.len();
        for (id, page) in tx.pages {
            self.write_page(id, &page)?;
        }
        for (key, value) in tx.meta {
            self.device.set_meta(&key, value)?;
        }
        self.persist_max_page_id()?;
        debug!(pages, "transaction committed");
        Ok(())
    }

    /// Abort the active transaction: discard both buffers, drop the cache,
    /// and reload the allocation counter from the device (undoing any
    /// transactional allocations).
    pub fn rollback(&mut self) -> DbResult<()> {
        if self.tx.take().is_none() {
            return Err(DbError::NoTransaction);
        }
        self.refresh()?;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Drop the page cache and reload the allocation counter from the device.
    pub fn refresh(&mut self) -> DbResult<()> {
        self.cache.clear();
        self.max_page_id = self.load_max_page_id()?;
        Ok(())
    }

    /// Consume the disk, handing back the underlying device.
    pub fn into_device(self) -> Box<dyn BlockDevice> {
        self.device
    }

    fn load_max_page_id(&mut self) -> DbResult<u32> {
        match self.device.get_meta(MAX_PAGE_ID_KEY)? {
            Some(value) => value
                .as_u64()
                .map(|n| n as u32)
                .ok_or_else(|| DbError::Storage(format!("invalid {MAX_PAGE_ID_KEY}: {value}"))),
            None => Ok(0),
        }
    }

    fn persist_max_page_id(&mut self) -> DbResult<()> {
        self.device
            .set_meta(MAX_PAGE_ID_KEY, serde_json::json!(self.max_page_id))
    }
}
