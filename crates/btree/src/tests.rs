use super::*;
use blockdev::MemDevice;

fn disk() -> VirtualDisk {
    VirtualDisk::new(Box::new(MemDevice::new()), 64).unwrap()
}

/// A payload sized so that a leaf holds at most 8 cells before splitting.
fn big_payload(key: u32) -> Vec<u8> {
    let mut payload = format!("row-{key}-").into_bytes();
    payload.resize(500, b'x');
    payload
}

#[test]
fn open_materializes_an_empty_leaf() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    BTree::open(&mut disk, root).unwrap();

    let page = disk.read_page(root).unwrap();
    assert_eq!(node_type(&page.data), NODE_LEAF);
    assert_eq!(page::cell_count(&page.data), 0);
}

#[test]
fn search_on_empty_tree_returns_none() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();
    assert_eq!(tree.search(42).unwrap(), None);
}

#[test]
fn insert_then_search_round_trips() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    tree.insert(10, b"ten").unwrap();
    tree.insert(5, b"five").unwrap();
    tree.insert(20, b"twenty").unwrap();

    assert_eq!(tree.search(5).unwrap().as_deref(), Some(&b"five"[..]));
    assert_eq!(tree.search(10).unwrap().as_deref(), Some(&b"ten"[..]));
    assert_eq!(tree.search(20).unwrap().as_deref(), Some(&b"twenty"[..]));
    assert_eq!(tree.search(15).unwrap(), None);
}

#[test]
fn scan_is_sorted_regardless_of_insert_order() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    for key in [8u32, 3, 11, 1, 9, 5, 2] {
        tree.insert(key, key.to_string().as_bytes()).unwrap();
    }

    let keys: Vec<u32> = tree.scan_all().unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![1, 2, 3, 5, 8, 9, 11]);
}

#[test]
fn duplicate_insert_is_rejected_and_leaves_tree_unchanged() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    tree.insert(7, b"first").unwrap();
    let err = tree.insert(7, b"second").unwrap_err();
    assert!(matches!(err, DbError::DuplicateKey(7)));
    assert_eq!(tree.search(7).unwrap().as_deref(), Some(&b"first"[..]));
    assert_eq!(tree.scan_all().unwrap().len(), 1);
}

#[test]
fn delete_removes_the_key() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    tree.insert(1, b"a").unwrap();
    tree.insert(2, b"b").unwrap();
    tree.insert(3, b"c").unwrap();
    tree.delete(2).unwrap();

    assert_eq!(tree.search(2).unwrap(), None);
    let keys: Vec<u32> = tree.scan_all().unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![1, 3]);
}

#[test]
fn delete_of_missing_key_errs() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();
    tree.insert(1, b"a").unwrap();

    assert!(matches!(tree.delete(9), Err(DbError::KeyNotFound(9))));
}

#[test]
fn max_key_tracks_the_largest_insert() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    assert_eq!(tree.max_key().unwrap(), 0);
    tree.insert(4, b"d").unwrap();
    assert_eq!(tree.max_key().unwrap(), 4);
    tree.insert(9, b"i").unwrap();
    assert_eq!(tree.max_key().unwrap(), 9);
    // Smaller keys leave the maximum untouched.
    tree.insert(6, b"f").unwrap();
    assert_eq!(tree.max_key().unwrap(), 9);
}

#[test]
fn leaf_cells_are_big_endian_on_disk() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();
    tree.insert(0x0102_0304, b"ok").unwrap();

    let page = disk.read_page(root).unwrap();
    assert_eq!(
        &page.data[page::HEADER_SIZE..page::HEADER_SIZE + 8],
        &[0x01, 0x02, 0x03, 0x04, 0x00, 0x00, 0x00, 0x02]
    );
    assert_eq!(&page.data[page::HEADER_SIZE + 8..page::HEADER_SIZE + 10], b"ok");
}

#[test]
fn root_split_replaces_the_root_and_keeps_every_key() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    for key in 1..=9u32 {
        tree.insert(key, &big_payload(key)).unwrap();
    }

    assert_ne!(tree.root(), root, "root split should replace the root");
    let keys: Vec<u32> = tree.scan_all().unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (1..=9).collect::<Vec<_>>());
    for key in 1..=9u32 {
        assert_eq!(tree.search(key).unwrap(), Some(big_payload(key)));
    }
}

#[test]
fn root_split_promotes_first_key_of_right_half() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    // 9 cells split at mid = 4: left holds 1..=4, right holds 5..=9.
    for key in 1..=9u32 {
        tree.insert(key, &big_payload(key)).unwrap();
    }

    let new_root = tree.root();
    let page = disk.read_page(new_root).unwrap();
    assert_eq!(node_type(&page.data), page::NODE_INTERNAL);
    assert_eq!(page::cell_count(&page.data), 1);
    assert_eq!(page::read_u32(&page.data, page::HEADER_SIZE), root.0);
    assert_eq!(page::read_u32(&page.data, page::HEADER_SIZE + 4), 5);

    // The new root id is recorded in metadata.
    assert_eq!(
        disk.get_meta("root").unwrap(),
        Some(serde_json::json!(new_root.0))
    );
}

#[test]
fn key_equal_to_a_separator_routes_to_the_right_child() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    for key in 1..=9u32 {
        tree.insert(key, &big_payload(key)).unwrap();
    }

    // The separator key (5) lives in the right child; an insert of the same
    // key must still find it there and be rejected.
    assert!(matches!(
        tree.insert(5, b"again"),
        Err(DbError::DuplicateKey(5))
    ));
    assert_eq!(tree.search(5).unwrap(), Some(big_payload(5)));
}

#[test]
fn repeated_splits_build_a_multi_leaf_tree() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    for key in 1..=40u32 {
        tree.insert(key, &big_payload(key)).unwrap();
    }

    let keys: Vec<u32> = tree.scan_all().unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (1..=40).collect::<Vec<_>>());
    for key in 1..=40u32 {
        assert_eq!(tree.search(key).unwrap(), Some(big_payload(key)));
    }
    assert_eq!(tree.max_key().unwrap(), 40);
}

#[test]
fn splits_handle_unordered_inserts() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    // A shuffled key sequence stressing splits in both halves.
    let keys = [17u32, 3, 29, 8, 40, 1, 22, 35, 12, 6, 27, 19, 31, 4, 38, 10, 24, 15, 33, 2];
    for &key in &keys {
        tree.insert(key, &big_payload(key)).unwrap();
    }

    let mut sorted = keys.to_vec();
    sorted.sort_unstable();
    let scanned: Vec<u32> = tree.scan_all().unwrap().into_iter().map(|(k, _)| k).collect();
    assert_eq!(scanned, sorted);
    for &key in &keys {
        assert_eq!(tree.search(key).unwrap(), Some(big_payload(key)));
    }
}

#[test]
fn delete_still_works_after_splits() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    for key in 1..=20u32 {
        tree.insert(key, &big_payload(key)).unwrap();
    }
    for key in [5u32, 13, 20] {
        tree.delete(key).unwrap();
    }

    let scanned: Vec<u32> = tree.scan_all().unwrap().into_iter().map(|(k, _)| k).collect();
    let expected: Vec<u32> = (1..=20).filter(|k| ![5, 13, 20].contains(k)).collect();
    assert_eq!(scanned, expected);
    assert_eq!(tree.search(13).unwrap(), None);
}

#[test]
fn internal_root_overflow_is_index_page_full() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let mut tree = BTree::open(&mut disk, root).unwrap();

    // A payload sized so a leaf holds exactly 2 cells: key 3 splits the root,
    // and every ascending insert after that splits the right-most leaf and
    // promotes one more separator into the internal root. The root holds
    // 510 separators (header + child_0 + 510 * 8 bytes); inserting key 513
    // attempts the 511th and must fail, since internal nodes do not split.
    let payload = vec![b'z'; 2000];
    for key in 1..=512u32 {
        tree.insert(key, &payload).unwrap();
    }

    assert!(matches!(
        tree.insert(513, &payload),
        Err(DbError::IndexPageFull)
    ));
    // Keys outside the failed split's leaf remain reachable.
    assert_eq!(tree.search(1).unwrap(), Some(payload.clone()));
    assert_eq!(tree.search(256).unwrap(), Some(payload));
}

#[test]
fn tree_survives_reopening_from_its_root_id() {
    let mut disk = disk();
    let root = disk.allocate_page().unwrap();
    let current_root;
    {
        let mut tree = BTree::open(&mut disk, root).unwrap();
        for key in 1..=12u32 {
            tree.insert(key, &big_payload(key)).unwrap();
        }
        current_root = tree.root();
    }

    let mut tree = BTree::open(&mut disk, current_root).unwrap();
    assert_eq!(tree.search(12).unwrap(), Some(big_payload(12)));
    assert_eq!(tree.scan_all().unwrap().len(), 12);
}
