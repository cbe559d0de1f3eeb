use keelhash::{HashTable, HashTableConfig, MAX_FILL_FACTOR};
use keelhash_test_utils::{insert_direct, int_key_ctx, int_row, key_row, new_table, probe_payloads};

#[test]
fn test_grow_by_check_and_resize() {
    for config in [HashTableConfig::linear(2), HashTableConfig::quadratic(2)] {
        let mut ctx = int_key_ctx(&config);
        let mut table = new_table(&config);
        let num_rows = 4096;
        for key in 0..num_rows {
            table.check_and_resize(1).unwrap();
            assert_eq!(insert_direct(&mut table, &mut ctx, int_row(key, -key)), Some(true));
            assert!(table.load_factor() <= MAX_FILL_FACTOR);
        }
        assert_eq!(table.size(), num_rows as usize);
        assert_eq!(
            table.num_buckets(),
            HashTable::estimate_num_buckets(num_rows as usize)
        );
        for key in 0..num_rows {
            assert_eq!(probe_payloads(&mut table, &mut ctx, &key_row(key)), vec![-key]);
        }
        assert!(table.stats().num_resizes > 0);
    }
}

#[test]
fn test_grow_in_batches() {
    let config = HashTableConfig::quadratic(8);
    let mut ctx = int_key_ctx(&config);
    let mut table = new_table(&config);
    for batch in 0..8 {
        table.check_and_resize(100).unwrap();
        let before = table.num_buckets();
        for key in (batch * 100)..((batch + 1) * 100) {
            assert_eq!(insert_direct(&mut table, &mut ctx, int_row(key, key)), Some(true));
        }
        assert_eq!(table.num_buckets(), before);
    }
    assert_eq!(table.size(), 800);
}

#[test]
fn test_shrink_back_after_growth() {
    let config = HashTableConfig::linear(4);
    let mut ctx = int_key_ctx(&config);
    let mut table = new_table(&config);
    table.resize(1 << 16).unwrap();
    for key in 0..24 {
        insert_direct(&mut table, &mut ctx, int_row(key, key));
    }
    let target = HashTable::estimate_num_buckets(24);
    assert_eq!(target, 32);
    table.resize(target).unwrap();
    assert_eq!(table.size(), 24);
    assert!(table.resize(target / 2).is_err());
    for key in 0..24 {
        assert_eq!(probe_payloads(&mut table, &mut ctx, &key_row(key)), vec![key]);
    }
}
