use ahash::RandomState;
use common::{DbResult, Page, PageId};
use hashbrown::HashMap;

use crate::BlockDevice;

type Map<K, V> = HashMap<K, V, RandomState>;

/// In-process block device backed by hash maps.
///
/// Nothing survives the process; useful for tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemDevice {
    pages: Map<PageId, Page>,
    meta: Map<String, serde_json::Value>,
}

impl MemDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockDevice for MemDevice {
    fn read_page(&mut self, id: PageId) -> DbResult<Page> {
        Ok(self.pages.get(&id).cloned().unwrap_or_default())
    }

    fn write_page(&mut self, id: PageId, page: &Page) -> DbResult<()> {
        self.pages.insert(id, page.clone());
        Ok(())
    }

    fn get_meta(&mut self, key: &str) -> DbResult<Option<serde_json::Value>> {
        Ok(self.meta.get(key).cloned())
    }

    fn set_meta(&mut self, key: &str, value: serde_json::Value) -> DbResult<()> {
        self.meta.insert(key.to_string(), value);
        Ok(())
    }

    fn reset(&mut self) -> DbResult<()> {
        self.pages.clear();
        self.meta.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwritten_page_reads_as_zeroes() {
        let mut dev = MemDevice::new();
        let page = dev.read_page(PageId(7)).unwrap();
        assert!(page.is_zeroed());
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut dev = MemDevice::new();
        let page = Page::from_bytes(&[0xAB; 16]);
        dev.write_page(PageId(1), &page).unwrap();
        assert_eq!(dev.read_page(PageId(1)).unwrap(), page);
    }

    #[test]
    fn meta_round_trips_structured_values() {
        let mut dev = MemDevice::new();
        let value = json!({"tables": [{"name": "users", "seq": 3}], "n": 42});
        dev.set_meta("tables", value.clone()).unwrap();
        assert_eq!(dev.get_meta("tables").unwrap(), Some(value));
        assert_eq!(dev.get_meta("missing").unwrap(), None);
    }

    #[test]
    fn reset_erases_everything() {
        let mut dev = MemDevice::new();
        dev.write_page(PageId(1), &Page::from_bytes(&[1])).unwrap();
        dev.set_meta("k", json!(1)).unwrap();
        dev.reset().unwrap();
        assert!(dev.read_page(PageId(1)).unwrap().is_zeroed());
        assert_eq!(dev.get_meta("k").unwrap(), None);
    }
}
