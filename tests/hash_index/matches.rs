use std::collections::HashSet;

use keelhash::HashTableConfig;
use keelhash_test_utils::{insert_direct, int_key_ctx, int_row, key_row, new_table, payload};

#[test]
fn test_unmatched_build_rows_after_probe() {
    let config = HashTableConfig::quadratic(32);
    let mut ctx = int_key_ctx(&config);
    let mut table = new_table(&config);
    for key in 0..10 {
        insert_direct(&mut table, &mut ctx, int_row(key, key));
        if key % 3 == 0 {
            insert_direct(&mut table, &mut ctx, int_row(key, key + 100));
        }
    }
    assert!(!table.has_matches());

    for key in [0, 1, 2, 3] {
        let hash = ctx.evaluate_and_hash_probe(&key_row(key)).unwrap();
        let mut cursor = table.find(&mut ctx, hash);
        while !cursor.at_end() {
            cursor.set_matched();
            cursor.next_duplicate();
        }
    }
    assert!(table.has_matches());

    let mut cursor = table.first_unmatched(&mut ctx);
    let mut unmatched = HashSet::new();
    while !cursor.at_end() {
        assert!(!cursor.is_matched());
        unmatched.extend(payload(&mut cursor));
        cursor.next_unmatched();
    }
    let expected: HashSet<i64> = [4, 5, 6, 106, 7, 8, 9, 109].into_iter().collect();
    assert_eq!(unmatched, expected);
}

#[test]
fn test_match_bits_survive_resize() {
    let config = HashTableConfig::linear(16);
    let mut ctx = int_key_ctx(&config);
    let mut table = new_table(&config);
    insert_direct(&mut table, &mut ctx, int_row(1, 10));
    insert_direct(&mut table, &mut ctx, int_row(2, 20));
    insert_direct(&mut table, &mut ctx, int_row(2, 21));

    let hash = ctx.evaluate_and_hash_probe(&key_row(1)).unwrap();
    table.find(&mut ctx, hash).set_matched();
    let hash = ctx.evaluate_and_hash_probe(&key_row(2)).unwrap();
    let mut cursor = table.find(&mut ctx, hash);
    cursor.next_duplicate();
    cursor.set_matched();

    table.resize(256).unwrap();
    table.resize(4).unwrap();

    let mut cursor = table.first_unmatched(&mut ctx);
    assert_eq!(payload(&mut cursor), Some(21));
    cursor.next_unmatched();
    assert!(cursor.at_end());
}

#[test]
fn test_match_bit_moves_with_promoted_row() {
    let config = HashTableConfig::linear(8);
    let mut ctx = int_key_ctx(&config);
    let mut table = new_table(&config);
    insert_direct(&mut table, &mut ctx, int_row(5, 1));
    let hash = ctx.evaluate_and_hash_probe(&key_row(5)).unwrap();
    table.find(&mut ctx, hash).set_matched();

    insert_direct(&mut table, &mut ctx, int_row(5, 2));
    let mut cursor = table.find(&mut ctx, hash);
    assert_eq!(payload(&mut cursor), Some(2));
    assert!(!cursor.is_matched());
    cursor.next_duplicate();
    assert_eq!(payload(&mut cursor), Some(1));
    assert!(cursor.is_matched());
}
