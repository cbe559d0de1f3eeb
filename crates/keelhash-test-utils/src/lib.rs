#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use keelhash::{
    ColumnRef, Cursor, DataType, HashTable, HashTableConfig, HashTableCtx, KeyExpr, MemTracker,
    Record, Result, Value,
};

/// A `(key, payload)` row of two INT64 columns.
pub fn int_row(key: i64, payload: i64) -> Record {
    Record::from_values(vec![Value::int64(key), Value::int64(payload)])
}

pub fn key_row(key: i64) -> Record {
    Record::from_values(vec![Value::int64(key)])
}

pub fn null_key_row(payload: i64) -> Record {
    Record::from_values(vec![Value::null(), Value::int64(payload)])
}

pub fn int_key_exprs() -> Vec<Box<dyn KeyExpr>> {
    vec![Box::new(ColumnRef::new(0, DataType::Int64))]
}

/// Context keyed on column 0 of both sides.
pub fn int_key_ctx(config: &HashTableConfig) -> HashTableCtx {
    HashTableCtx::from_config(config, int_key_exprs(), int_key_exprs())
        .unwrap_or_else(|e| panic!("invalid test config {config:?}: {e}"))
}

pub fn new_table(config: &HashTableConfig) -> HashTable {
    HashTable::new(config, Arc::new(MemTracker::unlimited("test")))
        .unwrap_or_else(|e| panic!("failed to create table: {e}"))
}

/// Evaluates and inserts `row`. Returns `None` when the key is null and
/// skipped, otherwise whether the insert succeeded.
pub fn insert_direct(table: &mut HashTable, ctx: &mut HashTableCtx, row: Record) -> Option<bool> {
    let row = Arc::new(row);
    let hash = ctx.evaluate_and_hash_build(&row)?;
    Some(table.insert_row(ctx, row, hash))
}

/// Payload column of the current row.
pub fn payload(cursor: &mut Cursor<'_>) -> Option<i64> {
    cursor.get_row().and_then(|row| row.get(1)).and_then(Value::as_i64)
}

/// Payloads of every row whose key equals `probe`'s key, in chain order.
pub fn probe_payloads(table: &mut HashTable, ctx: &mut HashTableCtx, probe: &Record) -> Vec<i64> {
    let Some(hash) = ctx.evaluate_and_hash_probe(probe) else {
        return Vec::new();
    };
    let mut cursor = table.find(ctx, hash);
    let mut payloads = Vec::new();
    while !cursor.at_end() {
        payloads.extend(payload(&mut cursor));
        cursor.next_duplicate();
    }
    payloads
}

/// Full scan from `begin`, grouping payloads by the key in column 0.
pub fn collect_scan(table: &mut HashTable, ctx: &mut HashTableCtx) -> HashMap<Value, Vec<i64>> {
    let mut rows: HashMap<Value, Vec<i64>> = HashMap::new();
    let mut cursor = table.begin(ctx);
    while !cursor.at_end() {
        if let Some(row) = cursor.get_row() {
            let key = row.get(0).cloned().unwrap_or(Value::Null);
            let payload = row.get(1).and_then(Value::as_i64).unwrap_or_default();
            rows.entry(key).or_default().push(payload);
        }
        cursor.next();
    }
    rows
}

pub fn assert_error_contains<T>(result: Result<T>, keywords: &[&str]) {
    match result {
        Ok(_) => panic!("Expected error but got Ok result"),
        Err(e) => {
            let error_msg = e.to_string().to_lowercase();
            let found = keywords
                .iter()
                .any(|keyword| error_msg.contains(&keyword.to_lowercase()));
            assert!(
                found,
                "Error message '{}' does not contain any of the expected keywords: {:?}",
                e, keywords
            );
        }
    }
}
