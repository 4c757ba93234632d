//! Paged B-tree: an ordered map from u32 keys to variable-length payloads,
//! laid out over virtual-disk pages.
//!
//! The tree holds exactly one piece of mutable state, the current root page
//! id, which changes when a root split allocates a new root. Handles borrow
//! the [`VirtualDisk`] for the duration of one operation sequence; callers
//! (the engine façade) persist the root id in the catalog and reopen handles
//! as needed, so there is never a stale handle to invalidate.
//!
//! Splits locate the parent from the descent path recorded on the way down
//! rather than trusting the stored parent pointer, but parent pointers are
//! still written on every split and root creation so the on-disk format stays
//! complete. Internal nodes do not split; inserting a separator into a full
//! internal node fails with `IndexPageFull`.

#[cfg(test)]
mod tests;

pub mod page;

use common::{DbError, DbResult, PAGE_SIZE, Page, PageId};
use vdisk::VirtualDisk;

use crate::page::{
    HEADER_SIZE, NODE_INTERNAL, NODE_LEAF, cell_count, node_type, parent, read_u32, set_cell_count,
    set_node_type, set_parent, write_u32,
};

/// Metadata key recording the root id after a root split.
const ROOT_META_KEY: &str = "root";

/// A single leaf entry held in memory during a node rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LeafCell {
    key: u32,
    payload: Vec<u8>,
}

impl LeafCell {
    /// Bytes this cell occupies on a page: key + payload size + payload.
    fn size(&self) -> usize {
        8 + self.payload.len()
    }
}

/// A B-tree handle over a [`VirtualDisk`].
pub struct BTree<'d> {
    disk: &'d mut VirtualDisk,
    root: PageId,
}

impl<'d> BTree<'d> {
    /// Open the tree rooted at `root`, materializing an empty leaf header if
    /// the root page has never been written.
    pub fn open(disk: &'d mut VirtualDisk, root: PageId) -> DbResult<Self> {
        let mut tree = Self { disk, root };
        let page = tree.disk.read_page(root)?;
        if page.is_zeroed() {
            let mut page = Page::new();
            set_node_type(&mut page.data, NODE_LEAF);
            tree.disk.write_page(root, &page)?;
        }
        Ok(tree)
    }

    /// The current root page id. Callers must re-read this after inserts,
    /// since a root split replaces it.
    pub fn root(&self) -> PageId {
        self.root
    }

    /// Point lookup. Returns the payload stored under `key`, if any.
    pub fn search(&mut self, key: u32) -> DbResult<Option<Vec<u8>>> {
        let path = self.descend(key)?;
        let page = self.disk.read_page(*path.last().expect("descent path is never empty"))?;
        let cells = read_leaf_cells(&page.data)?;
        Ok(cells
            .into_iter()
            .find(|cell| cell.key == key)
            .map(|cell| cell.payload))
    }

    /// Insert `payload` under `key`, splitting the target leaf if it is full.
    ///
    /// Fails with `DuplicateKey` if `key` is already present.
    pub fn insert(&mut self, key: u32, payload: &[u8]) -> DbResult<()> {
        let path = self.descend(key)?;
        let leaf_id = *path.last().expect("descent path is never empty");
        let page = self.disk.read_page(leaf_id)?;
        let mut cells = read_leaf_cells(&page.data)?;

        if cells.iter().any(|cell| cell.key == key) {
            return Err(DbError::DuplicateKey(key));
        }

        let new_cell = LeafCell {
            key,
            payload: payload.to_vec(),
        };
        let used: usize = cells.iter().map(LeafCell::size).sum();
        if HEADER_SIZE + used + new_cell.size() <= PAGE_SIZE {
            let idx = cells
                .iter()
                .position(|cell| cell.key > key)
                .unwrap_or(cells.len());
            cells.insert(idx, new_cell);
            self.write_leaf(leaf_id, &cells, parent(&page.data))
        } else {
            cells.push(new_cell);
            cells.sort_by_key(|cell| cell.key);
            self.split_leaf(&path, cells)
        }
    }

    /// Remove the entry stored under `key`.
    ///
    /// No rebalancing, underflow handling, or page reclamation is performed.
    pub fn delete(&mut self, key: u32) -> DbResult<()> {
        let path = self.descend(key)?;
        let leaf_id = *path.last().expect("descent path is never empty");
        let page = self.disk.read_page(leaf_id)?;
        let mut cells = read_leaf_cells(&page.data)?;

        let idx = cells
            .iter()
            .position(|cell| cell.key == key)
            .ok_or(DbError::KeyNotFound(key))?;
        cells.remove(idx);
        self.write_leaf(leaf_id, &cells, parent(&page.data))
    }

    /// Full in-order traversal: every `(key, payload)` in strictly ascending
    /// key order.
    pub fn scan_all(&mut self) -> DbResult<Vec<(u32, Vec<u8>)>> {
        let mut out = Vec::new();
        self.collect(self.root, &mut out)?;
        Ok(out)
    }

    /// The largest key in the tree, or `0` if the tree is empty.
    pub fn max_key(&mut self) -> DbResult<u32> {
        let mut current = self.root;
        loop {
            let page = self.disk.read_page(current)?;
            match node_type(&page.data) {
                NODE_LEAF => {
                    let cells = read_leaf_cells(&page.data)?;
                    return Ok(cells.last().map(|cell| cell.key).unwrap_or(0));
                }
                NODE_INTERNAL => {
                    let (child0, entries) = read_internal(&page.data)?;
                    current = entries.last().map(|&(_, child)| child).unwrap_or(child0);
                }
                other => return Err(corrupt_node(current, other)),
            }
        }
    }

    /// Walk from the root to the leaf that owns `key`, returning the visited
    /// page ids (root first, leaf last).
    ///
    /// Routing descends into the child preceding the first separator that is
    /// strictly greater than `key`; a key equal to a separator routes right.
    fn descend(&mut self, key: u32) -> DbResult<Vec<PageId>> {
        let mut path = vec![self.root];
        loop {
            let current = *path.last().expect("path starts with the root");
            let page = self.disk.read_page(current)?;
            match node_type(&page.data) {
                NODE_LEAF => return Ok(path),
                NODE_INTERNAL => {
                    let (child0, entries) = read_internal(&page.data)?;
                    // `next` ends as the child preceding the first separator
                    // greater than the key, or child_n when none is.
                    let mut next = child0;
                    for &(separator, child) in &entries {
                        if key < separator {
                            break;
                        }
                        next = child;
                    }
                    path.push(next);
                }
                other => return Err(corrupt_node(current, other)),
            }
        }
    }

    /// Split an over-full leaf, promoting the first key of the right half.
    ///
    /// `cells` is the sorted set of existing cells plus the incoming one.
    fn split_leaf(&mut self, path: &[PageId], cells: Vec<LeafCell>) -> DbResult<()> {
        let leaf_id = *path.last().expect("descent path is never empty");
        let mid = cells.len() / 2;
        let separator = cells[mid].key;
        let (left, right) = cells.split_at(mid);

        let right_id = self.disk.allocate_page()?;

        if path.len() == 1 {
            // The leaf was the root: grow the tree by one level.
            let new_root = self.disk.allocate_page()?;
            self.write_leaf(leaf_id, left, new_root)?;
            self.write_leaf(right_id, right, new_root)?;
            self.write_internal(new_root, leaf_id, &[(separator, right_id)], PageId::NULL)?;
            self.root = new_root;
            self.disk
                .set_meta(ROOT_META_KEY, serde_json::json!(new_root.0))?;
            Ok(())
        } else {
            let parent_id = path[path.len() - 2];
            self.write_leaf(leaf_id, left, parent_id)?;
            self.write_leaf(right_id, right, parent_id)?;
            self.insert_into_internal(parent_id, separator, right_id)
        }
    }

    /// Insert a `(separator, right child)` entry into an internal node,
    /// keeping its entries sorted.
    ///
    /// Internal splits are not implemented: a separator that no longer fits
    /// fails with `IndexPageFull`.
    fn insert_into_internal(
        &mut self,
        node_id: PageId,
        key: u32,
        right_child: PageId,
    ) -> DbResult<()> {
        let page = self.disk.read_page(node_id)?;
        if node_type(&page.data) != NODE_INTERNAL {
            return Err(DbError::Storage(format!(
                "page {} is not an internal node",
                node_id.0
            )));
        }

        let (child0, mut entries) = read_internal(&page.data)?;
        entries.push((key, right_child));
        entries.sort_by_key(|&(key, _)| key);

        if HEADER_SIZE + 4 + entries.len() * 8 > PAGE_SIZE {
            return Err(DbError::IndexPageFull);
        }
        self.write_internal(node_id, child0, &entries, parent(&page.data))
    }

    fn collect(&mut self, id: PageId, out: &mut Vec<(u32, Vec<u8>)>) -> DbResult<()> {
        let page = self.disk.read_page(id)?;
        match node_type(&page.data) {
            NODE_LEAF => {
                for cell in read_leaf_cells(&page.data)? {
                    out.push((cell.key, cell.payload));
                }
                Ok(())
            }
            NODE_INTERNAL => {
                let (child0, entries) = read_internal(&page.data)?;
                self.collect(child0, out)?;
                for (_, child) in entries {
                    self.collect(child, out)?;
                }
                Ok(())
            }
            other => Err(corrupt_node(id, other)),
        }
    }

    /// Rewrite `id` as a leaf holding `cells`, in order.
    fn write_leaf(&mut self, id: PageId, cells: &[LeafCell], parent: PageId) -> DbResult<()> {
        let size = HEADER_SIZE + cells.iter().map(LeafCell::size).sum::<usize>();
        if size > PAGE_SIZE {
            return Err(DbError::Storage(format!(
                "leaf {} overflow: {size} bytes",
                id.0
            )));
        }

        let mut page = Page::new();
        set_node_type(&mut page.data, NODE_LEAF);
        set_cell_count(&mut page.data, cells.len() as u16);
        set_parent(&mut page.data, parent);

        let mut offset = HEADER_SIZE;
        for cell in cells {
            write_u32(&mut page.data, offset, cell.key);
            write_u32(&mut page.data, offset + 4, cell.payload.len() as u32);
            page.data[offset + 8..offset + 8 + cell.payload.len()].copy_from_slice(&cell.payload);
            offset += cell.size();
        }
        self.disk.write_page(id, &page)
    }

    /// Rewrite `id` as an internal node: `child0` then the sorted
    /// `(separator, child)` entries.
    fn write_internal(
        &mut self,
        id: PageId,
        child0: PageId,
        entries: &[(u32, PageId)],
        parent: PageId,
    ) -> DbResult<()> {
        let mut page = Page::new();
        set_node_type(&mut page.data, NODE_INTERNAL);
        set_cell_count(&mut page.data, entries.len() as u16);
        set_parent(&mut page.data, parent);

        write_u32(&mut page.data, HEADER_SIZE, child0.0);
        let mut offset = HEADER_SIZE + 4;
        for &(key, child) in entries {
            write_u32(&mut page.data, offset, key);
            write_u32(&mut page.data, offset + 4, child.0);
            offset += 8;
        }
        self.disk.write_page(id, &page)
    }
}

/// Decode every cell of a leaf page.
fn read_leaf_cells(data: &[u8]) -> DbResult<Vec<LeafCell>> {
    let count = cell_count(data) as usize;
    let mut cells = Vec::with_capacity(count);
    let mut offset = HEADER_SIZE;
    for _ in 0..count {
        let key = read_u32(data, offset);
        let len = read_u32(data, offset + 4) as usize;
        let start = offset + 8;
        let end = start + len;
        if end > PAGE_SIZE {
            return Err(DbError::Storage(format!(
                "corrupt leaf cell: payload of {len} bytes at offset {offset}"
            )));
        }
        cells.push(LeafCell {
            key,
            payload: data[start..end].to_vec(),
        });
        offset = end;
    }
    Ok(cells)
}

/// Decode an internal node into its leftmost child and `(separator, child)`
/// entries.
fn read_internal(data: &[u8]) -> DbResult<(PageId, Vec<(u32, PageId)>)> {
    let count = cell_count(data) as usize;
    if HEADER_SIZE + 4 + count * 8 > PAGE_SIZE {
        return Err(DbError::Storage(format!(
            "corrupt internal node: {count} cells"
        )));
    }

    let child0 = PageId(read_u32(data, HEADER_SIZE));
    let mut entries = Vec::with_capacity(count);
    let mut offset = HEADER_SIZE + 4;
    for _ in 0..count {
        let key = read_u32(data, offset);
        let child = PageId(read_u32(data, offset + 4));
        entries.push((key, child));
        offset += 8;
    }
    Ok((child0, entries))
}

fn corrupt_node(id: PageId, ty: u8) -> DbError {
    DbError::Storage(format!("page {} has invalid node type {ty}", id.0))
}
