use std::sync::Arc;

use keelhash::{
    HashTable, HashTableConfig, MemTracker, PagedRowStore, RowIdx, RowRef, RowStore, StorageMode,
};
use keelhash_test_utils::{assert_error_contains, int_key_ctx, int_row, key_row, probe_payloads};

fn indexed_table(config: &HashTableConfig, store: &Arc<PagedRowStore>) -> HashTable {
    HashTable::with_row_store(
        config,
        Arc::new(MemTracker::unlimited("indexed")),
        Arc::clone(store) as Arc<dyn RowStore>,
    )
    .unwrap()
}

#[test]
fn test_indexed_build_and_probe() {
    let config = HashTableConfig::quadratic(1).with_storage_mode(StorageMode::Indexed);
    let store = Arc::new(PagedRowStore::with_rows_per_page(4));
    let mut table = indexed_table(&config, &store);
    let mut ctx = int_key_ctx(&config);

    for key in 0..50 {
        for copy in 0..2 {
            let row = int_row(key, key * 2 + copy);
            let hash = ctx.evaluate_and_hash_build(&row).unwrap();
            let idx = store.append(&row).unwrap();
            table.check_and_resize(1).unwrap();
            assert!(table.insert_idx(&mut ctx, idx, hash));
        }
    }
    assert_eq!(table.size(), 100);
    assert_eq!(store.num_rows(), 100);
    assert_eq!(store.num_pages(), 25);

    for key in 0..50 {
        let mut payloads = probe_payloads(&mut table, &mut ctx, &key_row(key));
        payloads.sort_unstable();
        assert_eq!(payloads, vec![key * 2, key * 2 + 1]);
    }
    assert!(probe_payloads(&mut table, &mut ctx, &key_row(50)).is_empty());
}

#[test]
fn test_indexed_cursor_returns_row_references() {
    let config = HashTableConfig::linear(8).with_storage_mode(StorageMode::Indexed);
    let store = Arc::new(PagedRowStore::new());
    let mut table = indexed_table(&config, &store);
    let mut ctx = int_key_ctx(&config);

    let row = int_row(3, 33);
    let hash = ctx.evaluate_and_hash_build(&row).unwrap();
    let idx = store.append(&row).unwrap();
    assert!(table.insert_idx(&mut ctx, idx, hash));

    let mut cursor = table.begin(&mut ctx);
    assert_eq!(cursor.get_row_reference(), Some(&RowRef::Indexed(idx)));
    assert_eq!(cursor.get_row(), Some(&row));
}

#[test]
fn test_indexed_table_rejects_direct_rows() {
    let config = HashTableConfig::linear(8).with_storage_mode(StorageMode::Indexed);
    let store = Arc::new(PagedRowStore::new());
    let mut table = indexed_table(&config, &store);
    let mut ctx = int_key_ctx(&config);
    let row = Arc::new(int_row(1, 1));
    let hash = ctx.evaluate_and_hash_build(&row).unwrap();
    assert!(!table.insert_row(&mut ctx, row, hash));
    assert!(table.is_empty());
}

#[test]
fn test_unknown_row_index_never_matches() {
    let config = HashTableConfig::linear(8).with_storage_mode(StorageMode::Indexed);
    let store = Arc::new(PagedRowStore::new());
    let mut table = indexed_table(&config, &store);
    let mut ctx = int_key_ctx(&config);
    let hash = ctx.evaluate_and_hash_build(&int_row(1, 1)).unwrap();
    assert!(table.insert_idx(&mut ctx, RowIdx::new(9, 9), hash));
    assert!(table.insert_idx(&mut ctx, RowIdx::new(9, 10), hash));
    assert_eq!(table.num_filled_buckets(), 2);
    let mut cursor = table.begin(&mut ctx);
    assert!(cursor.get_row().is_none());
}

#[test]
fn test_indexed_storage_needs_row_store() {
    let config = HashTableConfig::linear(8).with_storage_mode(StorageMode::Indexed);
    assert_error_contains(
        HashTable::new(&config, Arc::new(MemTracker::unlimited("indexed"))),
        &["row store"],
    );
}
