use keelhash::{HashTableConfig, ProbingMode, Value};
use keelhash_test_utils::{
    collect_scan, insert_direct, int_key_ctx, int_row, key_row, new_table, probe_payloads,
};

fn scan_scenario(probing_mode: ProbingMode) {
    let config = HashTableConfig::new()
        .with_probing_mode(probing_mode)
        .with_initial_num_buckets(1);
    let mut ctx = int_key_ctx(&config);
    let mut table = new_table(&config);

    for key in 0..5 {
        table.check_and_resize(1).unwrap();
        assert_eq!(insert_direct(&mut table, &mut ctx, int_row(key, key * 100)), Some(true));
    }
    assert_eq!(table.size(), 5);

    table.resize(2048).unwrap();
    assert_eq!(table.num_buckets(), 2048);
    assert_eq!(table.size(), 5);
    let scanned = collect_scan(&mut table, &mut ctx);
    assert_eq!(scanned.len(), 5);
    for key in 0..5 {
        assert_eq!(scanned[&Value::int64(key)], vec![key * 100]);
    }

    table.resize(64).unwrap();
    assert_eq!(table.num_buckets(), 64);
    assert_eq!(table.size(), 5);
    assert_eq!(collect_scan(&mut table, &mut ctx).len(), 5);

    table.resize(8).unwrap();
    assert_eq!(table.num_buckets(), 8);
    assert_eq!(table.size(), 5);
    for key in 0..5 {
        assert_eq!(probe_payloads(&mut table, &mut ctx, &key_row(key)), vec![key * 100]);
    }
    for key in 5..10 {
        assert!(probe_payloads(&mut table, &mut ctx, &key_row(key)).is_empty());
    }
}

#[test]
fn test_scan_resize_probe_linear() {
    scan_scenario(ProbingMode::Linear);
}

#[test]
fn test_scan_resize_probe_quadratic() {
    scan_scenario(ProbingMode::Quadratic);
}

#[test]
fn test_probe_missing_key_on_empty_table() {
    let config = HashTableConfig::quadratic(16);
    let mut ctx = int_key_ctx(&config);
    let mut table = new_table(&config);
    assert!(probe_payloads(&mut table, &mut ctx, &key_row(1)).is_empty());
    let cursor = table.begin(&mut ctx);
    assert!(cursor.at_end());
}

#[test]
fn test_fill_every_bucket() {
    for config in [HashTableConfig::linear(64), HashTableConfig::quadratic(64)] {
        let mut ctx = int_key_ctx(&config);
        let mut table = new_table(&config);
        for key in 0..64 {
            assert_eq!(insert_direct(&mut table, &mut ctx, int_row(key, key)), Some(true));
        }
        assert_eq!(table.empty_buckets(), 0);
        assert_eq!(table.load_factor(), 1.0);

        assert_eq!(insert_direct(&mut table, &mut ctx, int_row(64, 64)), Some(false));
        assert_eq!(table.size(), 64);
        assert!(probe_payloads(&mut table, &mut ctx, &key_row(64)).is_empty());
        for key in 0..64 {
            assert_eq!(probe_payloads(&mut table, &mut ctx, &key_row(key)), vec![key]);
        }
    }
}

#[test]
fn test_stats_display() {
    let config = HashTableConfig::linear(16);
    let mut ctx = int_key_ctx(&config);
    let mut table = new_table(&config);
    for key in 0..3 {
        insert_direct(&mut table, &mut ctx, int_row(key, 0));
    }
    let text = table.stats().to_string();
    assert!(text.starts_with("Buckets: 16 (3 filled"));
}
