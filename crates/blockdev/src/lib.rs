//! Block-device abstraction: raw persistence of fixed-size pages plus a small
//! string-keyed metadata side-store.
//!
//! The device is purely synchronous and non-transactional. Its only ordering
//! guarantee is that a successful write is visible to all subsequent reads of
//! the same page id. Transactionality is layered on top by the virtual disk.

mod file;
mod mem;

pub use file::FileDevice;
pub use mem::MemDevice;

use common::{DbResult, Page, PageId};

/// Raw, byte-addressable persistence of fixed-size pages keyed by page id.
///
/// Any backend satisfying the read-your-writes contract is acceptable; the
/// workspace ships an in-process map (`MemDevice`) and a page-file backend
/// (`FileDevice`).
pub trait BlockDevice {
    /// Returns the page's current bytes, or a zero-filled page if the id has
    /// never been written.
    fn read_page(&mut self, id: PageId) -> DbResult<Page>;

    /// Durably records the page.
    fn write_page(&mut self, id: PageId, page: &Page) -> DbResult<()>;

    /// Reads a metadata value. Values round-trip exactly as written.
    fn get_meta(&mut self, key: &str) -> DbResult<Option<serde_json::Value>>;

    /// Writes a metadata value.
    fn set_meta(&mut self, key: &str, value: serde_json::Value) -> DbResult<()>;

    /// Erases all pages and metadata.
    fn reset(&mut self) -> DbResult<()>;
}
