use std::sync::Arc;

use keelhash::{Bucket, HashTable, HashTableConfig, MIN_PAGE_NODES, MemTracker, NodeArena};
use keelhash_test_utils::{
    assert_error_contains, insert_direct, int_key_ctx, int_row, key_row, probe_payloads,
};

#[test]
fn test_table_charges_and_releases_tracker() {
    let config = HashTableConfig::quadratic(64);
    let tracker = Arc::new(MemTracker::unlimited("join"));
    let mut table = HashTable::new(&config, Arc::clone(&tracker)).unwrap();
    let mut ctx = int_key_ctx(&config);
    for key in 0..10 {
        insert_direct(&mut table, &mut ctx, int_row(key % 5, key));
    }
    assert_eq!(tracker.consumption(), table.byte_size());
    table.resize(1024).unwrap();
    assert_eq!(tracker.consumption(), table.byte_size());
    assert!(tracker.peak_consumption() > table.byte_size());
    drop(table);
    assert_eq!(tracker.consumption(), 0);
}

#[test]
fn test_overflow_refused_then_retried() {
    let config = HashTableConfig::linear(16);
    let bucket_bytes = 16 * std::mem::size_of::<Bucket>() as u64;
    let page_bytes = NodeArena::page_bytes(MIN_PAGE_NODES);
    let tracker = Arc::new(MemTracker::with_limit("join", bucket_bytes + page_bytes));
    let mut table = HashTable::new(&config, Arc::clone(&tracker)).unwrap();
    let mut ctx = int_key_ctx(&config);

    assert!(tracker.try_consume(page_bytes));
    assert_eq!(insert_direct(&mut table, &mut ctx, int_row(1, 1)), Some(true));
    assert_eq!(insert_direct(&mut table, &mut ctx, int_row(1, 2)), Some(false));
    assert_eq!(probe_payloads(&mut table, &mut ctx, &key_row(1)), vec![1]);
    assert_eq!(table.num_overflow_nodes(), 0);
    assert_eq!(table.size(), 1);

    tracker.release(page_bytes);
    assert_eq!(insert_direct(&mut table, &mut ctx, int_row(1, 2)), Some(true));
    assert_eq!(probe_payloads(&mut table, &mut ctx, &key_row(1)), vec![2, 1]);
}

#[test]
fn test_resize_over_limit_keeps_table() {
    let config = HashTableConfig::linear(16);
    let tracker = Arc::new(MemTracker::with_limit(
        "join",
        HashTable::estimate_size(12),
    ));
    let mut table = HashTable::new(&config, Arc::clone(&tracker)).unwrap();
    let mut ctx = int_key_ctx(&config);
    for key in 0..12 {
        table.check_and_resize(1).unwrap();
        insert_direct(&mut table, &mut ctx, int_row(key, key));
    }
    assert_error_contains(table.resize(1 << 20), &["memory limit"]);
    assert_eq!(table.num_buckets(), 16);
    for key in 0..12 {
        assert_eq!(probe_payloads(&mut table, &mut ctx, &key_row(key)), vec![key]);
    }
}

#[test]
fn test_create_over_limit() {
    let config = HashTableConfig::linear(1 << 16);
    let tracker = Arc::new(MemTracker::with_limit("join", 1024));
    assert_error_contains(HashTable::new(&config, tracker), &["memory limit"]);
}

#[test]
fn test_close_returns_all_memory() {
    let config = HashTableConfig::quadratic(8);
    let tracker = Arc::new(MemTracker::unlimited("join"));
    let mut table = HashTable::new(&config, Arc::clone(&tracker)).unwrap();
    let mut ctx = int_key_ctx(&config);
    for payload in 0..5 {
        insert_direct(&mut table, &mut ctx, int_row(0, payload));
    }
    assert!(tracker.consumption() > 0);
    table.close();
    assert_eq!(tracker.consumption(), 0);
}
