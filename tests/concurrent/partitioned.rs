use std::sync::Arc;

use keelhash::{
    HashTable, HashTableConfig, MemTracker, PagedRowStore, RowStore, StorageMode, Value,
};
use keelhash_test_utils::{collect_scan, int_key_ctx, int_row, key_row, probe_payloads};
use rayon::prelude::*;

const NUM_PARTITIONS: i64 = 8;
const ROWS_PER_PARTITION: i64 = 2000;

fn partition_rows(partition: i64) -> impl Iterator<Item = (i64, i64)> {
    (0..ROWS_PER_PARTITION).map(move |i| {
        let key = i * NUM_PARTITIONS + partition;
        (key / 2, key)
    })
}

#[test]
fn test_per_partition_tables_share_tracker() {
    let config = HashTableConfig::quadratic(64);
    let tracker = Arc::new(MemTracker::unlimited("join"));
    let base_ctx = int_key_ctx(&config);

    let tables: Vec<HashTable> = (0..NUM_PARTITIONS)
        .into_par_iter()
        .map(|partition| {
            let mut ctx = base_ctx.clone();
            let mut table = HashTable::new(&config, Arc::clone(&tracker)).unwrap();
            for (key, payload) in partition_rows(partition) {
                let row = Arc::new(int_row(key, payload));
                let hash = ctx.evaluate_and_hash_build(&row).unwrap();
                table.check_and_resize(1).unwrap();
                assert!(table.insert_row(&mut ctx, row, hash));
            }
            table
        })
        .collect();

    let total: u64 = tables.iter().map(HashTable::byte_size).sum();
    assert_eq!(tracker.consumption(), total);
    assert_eq!(
        tables.iter().map(HashTable::size).sum::<usize>(),
        (NUM_PARTITIONS * ROWS_PER_PARTITION) as usize
    );

    tables
        .into_par_iter()
        .enumerate()
        .for_each(|(partition, mut table)| {
            let mut ctx = base_ctx.clone();
            let scanned = collect_scan(&mut table, &mut ctx);
            for (key, payload) in partition_rows(partition as i64) {
                assert!(scanned[&Value::int64(key)].contains(&payload));
                assert!(probe_payloads(&mut table, &mut ctx, &key_row(key)).contains(&payload));
            }
        });
    assert_eq!(tracker.consumption(), 0);
}

#[test]
fn test_parallel_indexed_build_over_shared_store() {
    let config = HashTableConfig::linear(16).with_storage_mode(StorageMode::Indexed);
    let tracker = Arc::new(MemTracker::unlimited("join"));
    let store = Arc::new(PagedRowStore::with_rows_per_page(128).with_mem_tracker(Arc::clone(&tracker)));
    let base_ctx = int_key_ctx(&config);

    let sizes: Vec<usize> = (0..NUM_PARTITIONS)
        .into_par_iter()
        .map(|partition| {
            let mut ctx = base_ctx.clone();
            let mut table = HashTable::with_row_store(
                &config,
                Arc::clone(&tracker),
                Arc::clone(&store) as Arc<dyn RowStore>,
            )
            .unwrap();
            for (key, payload) in partition_rows(partition) {
                let row = int_row(key, payload);
                let hash = ctx.evaluate_and_hash_build(&row).unwrap();
                let idx = store.append(&row).unwrap();
                table.check_and_resize(1).unwrap();
                assert!(table.insert_idx(&mut ctx, idx, hash));
            }
            for (key, payload) in partition_rows(partition) {
                assert!(probe_payloads(&mut table, &mut ctx, &key_row(key)).contains(&payload));
            }
            table.size()
        })
        .collect();

    assert!(sizes.iter().all(|&size| size == ROWS_PER_PARTITION as usize));
    assert_eq!(store.num_rows(), (NUM_PARTITIONS * ROWS_PER_PARTITION) as usize);
    drop(store);
    assert_eq!(tracker.consumption(), 0);
}
