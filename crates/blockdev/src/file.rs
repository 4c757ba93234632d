use common::{DbError, DbResult, PAGE_SIZE, Page, PageId};
use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use crate::BlockDevice;

const PAGE_FILE: &str = "pages.db";
const META_FILE: &str = "meta.json";

/// File-backed block device.
///
/// Pages live in a single `pages.db` file at `id * PAGE_SIZE` offsets (id `0`
/// is the null sentinel and never written, so its slot stays empty). Metadata
/// is a JSON document rewritten on every update.
#[derive(Debug)]
pub struct FileDevice {
    dir: PathBuf,
    pages: File,
    meta: serde_json::Map<String, serde_json::Value>,
}

impl FileDevice {
    /// Open (or create) a device rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> DbResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let pages = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(PAGE_FILE))?;

        let meta_path = dir.join(META_FILE);
        let meta = if meta_path.exists() {
            let data = fs::read_to_string(&meta_path)?;
            serde_json::from_str(&data)
                .map_err(|e| DbError::Storage(format!("invalid metadata file: {e}")))?
        } else {
            serde_json::Map::new()
        };

        Ok(Self { dir, pages, meta })
    }

    fn save_meta(&self) -> DbResult<()> {
        let data = serde_json::to_string_pretty(&self.meta)
            .map_err(|e| DbError::Storage(format!("serialize metadata failed: {e}")))?;
        fs::write(self.dir.join(META_FILE), data)?;
        Ok(())
    }

    fn page_offset(id: PageId) -> u64 {
        id.0 as u64 * PAGE_SIZE as u64
    }
}

impl BlockDevice for FileDevice {
    fn read_page(&mut self, id: PageId) -> DbResult<Page> {
        let len = self.pages.metadata()?.len();
        let offset = Self::page_offset(id);
        if offset >= len {
            return Ok(Page::new());
        }

        self.pages.seek(SeekFrom::Start(offset))?;
        let mut page = Page::new();
        let n = self.pages.read(&mut page.data)?;
        if n == 0 {
            Ok(Page::new())
        } else if n < PAGE_SIZE {
            Err(DbError::Storage(format!(
                "partial page read: expected {PAGE_SIZE} bytes, got {n}"
            )))
        } else {
            Ok(page)
        }
    }

    fn write_page(&mut self, id: PageId, page: &Page) -> DbResult<()> {
        self.pages.seek(SeekFrom::Start(Self::page_offset(id)))?;
        self.pages.write_all(&page.data)?;
        self.pages.flush()?;
        Ok(())
    }

    fn get_meta(&mut self, key: &str) -> DbResult<Option<serde_json::Value>> {
        Ok(self.meta.get(key).cloned())
    }

    fn set_meta(&mut self, key: &str, value: serde_json::Value) -> DbResult<()> {
        self.meta.insert(key.to_string(), value);
        self.save_meta()
    }

    fn reset(&mut self) -> DbResult<()> {
        self.pages.set_len(0)?;
        self.meta.clear();
        let meta_path = self.dir.join(META_FILE);
        if meta_path.exists() {
            fs::remove_file(meta_path)?;
        }
        Ok(())
    }
}
