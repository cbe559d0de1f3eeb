use std::sync::Arc;

use chrono::Datelike;
use keelhash_common::error::{Error, Result};
use keelhash_common::types::Value;
use keelhash_storage::{Record, RowStore};

use super::bucket::RowRef;
use super::config::HashTableConfig;
use crate::key_expr::KeyExpr;

const SEED_MULTIPLIERS: [u32; 16] = [
    1_431_655_781,
    1_183_186_591,
    622_729_787,
    472_882_027,
    338_294_347,
    275_604_541,
    41_161_739,
    29_999_999,
    27_475_109,
    611_603,
    16_313_357,
    11_380_003,
    21_261_403,
    33_393_119,
    101,
    71_043_403,
];

/// Xored into every level 0 hash. Its 16-bit halves differ.
const LEVEL0_SALT: u32 = 0x9e37_79b9;

const SEED_INCREMENT: u32 = 0x9e37_79b9;

const NULL_SENTINEL: u32 = 0x5bd1_e995;

/// One hash seed per repartitioning level.
///
/// Rows that all landed in one partition at level `n` are rehashed with
/// `seed(n + 1)` so they spread out again; a single seed would send them
/// back to the same bucket every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedTable {
    seeds: Vec<u32>,
}

impl SeedTable {
    pub fn new(initial_seed: u32, num_levels: usize) -> Self {
        let num_levels = num_levels.max(1);
        let mut seeds = Vec::with_capacity(num_levels);
        let mut seed = initial_seed;
        seeds.push(seed);
        for level in 1..num_levels {
            let multiplier = SEED_MULTIPLIERS[(level - 1) % SEED_MULTIPLIERS.len()];
            seed = seed.wrapping_mul(multiplier).wrapping_add(SEED_INCREMENT);
            seeds.push(seed);
        }
        Self { seeds }
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn get(&self, level: usize) -> Option<u32> {
        self.seeds.get(level).copied()
    }

    pub fn seeds(&self) -> &[u32] {
        &self.seeds
    }
}

/// Hashes `data` with the hash function of `level`.
///
/// Level 0 is CRC32 started from `seed`, with its 16-bit halves swapped and
/// then xored with a constant whose halves differ. CRC32 of an empty input
/// is the seed and `s.rotate_left(16) ^ s` always has equal halves, so an
/// empty input never hashes to its seed. Deeper levels use xxHash32.
pub fn hash_bytes(data: &[u8], seed: u32, level: usize) -> u32 {
    if level == 0 {
        let mut hasher = crc32fast::Hasher::new_with_initial(seed);
        hasher.update(data);
        hasher.finalize().rotate_left(16) ^ LEVEL0_SALT
    } else {
        xxhash_rust::xxh32::xxh32(data, seed)
    }
}

fn encode_key_value(value: &Value, buf: &mut Vec<u8>) {
    buf.clear();
    match value {
        Value::Null => {
            buf.push(0);
            buf.extend_from_slice(&NULL_SENTINEL.to_le_bytes());
        }
        Value::Bool(b) => {
            buf.push(1);
            buf.push(u8::from(*b));
        }
        Value::Int64(i) => {
            buf.push(2);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float64(f) => {
            buf.push(3);
            let f = f.into_inner();
            let canonical = if f == 0.0 {
                0.0f64
            } else if f.is_nan() {
                f64::NAN
            } else {
                f
            };
            buf.extend_from_slice(&canonical.to_bits().to_le_bytes());
        }
        Value::Numeric(n) => {
            buf.push(4);
            buf.extend_from_slice(&n.normalize().serialize());
        }
        Value::String(s) => {
            buf.push(5);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            buf.push(6);
            buf.extend_from_slice(b);
        }
        Value::Date(d) => {
            buf.push(7);
            buf.extend_from_slice(&d.num_days_from_ce().to_le_bytes());
        }
        Value::DateTime(dt) => {
            buf.push(8);
            buf.extend_from_slice(&dt.and_utc().timestamp_micros().to_le_bytes());
        }
        Value::Timestamp(ts) => {
            buf.push(9);
            buf.extend_from_slice(&ts.timestamp_micros().to_le_bytes());
        }
    }
}

fn key_matches(exprs: &[Box<dyn KeyExpr>], key_values: &[Value], row: &Record) -> bool {
    exprs
        .iter()
        .zip(key_values)
        .all(|(expr, current)| expr.evaluate(row) == *current)
}

/// Per-table evaluation state: the key expressions of both join sides, the
/// hash seed of the current level, and the key of the row evaluated last.
///
/// A context is not shared between threads. Each worker clones its own; the
/// clones share the expressions and the seed table but not the scratch state.
#[derive(Debug)]
pub struct HashTableCtx {
    build_exprs: Arc<[Box<dyn KeyExpr>]>,
    probe_exprs: Arc<[Box<dyn KeyExpr>]>,
    stores_nulls: bool,
    finds_nulls: bool,
    level: usize,
    seeds: Arc<SeedTable>,
    key_values: Vec<Value>,
    key_nulls: Vec<bool>,
    key_bytes: Vec<u8>,
    pub(crate) scratch_row: Record,
}

impl HashTableCtx {
    pub fn new(
        build_exprs: Vec<Box<dyn KeyExpr>>,
        probe_exprs: Vec<Box<dyn KeyExpr>>,
        stores_nulls: bool,
        finds_nulls: bool,
        seeds: Arc<SeedTable>,
    ) -> Self {
        let num_keys = build_exprs.len();
        Self {
            build_exprs: build_exprs.into(),
            probe_exprs: probe_exprs.into(),
            stores_nulls,
            finds_nulls,
            level: 0,
            seeds,
            key_values: Vec::with_capacity(num_keys),
            key_nulls: Vec::with_capacity(num_keys),
            key_bytes: Vec::new(),
            scratch_row: Record::new(),
        }
    }

    pub fn from_config(
        config: &HashTableConfig,
        build_exprs: Vec<Box<dyn KeyExpr>>,
        probe_exprs: Vec<Box<dyn KeyExpr>>,
    ) -> Result<Self> {
        config.validate()?;
        if build_exprs.len() != config.num_build_key_exprs {
            return Err(Error::invalid_config(format!(
                "expected {} build key expressions, got {}",
                config.num_build_key_exprs,
                build_exprs.len()
            )));
        }
        if probe_exprs.len() != config.num_probe_key_exprs {
            return Err(Error::invalid_config(format!(
                "expected {} probe key expressions, got {}",
                config.num_probe_key_exprs,
                probe_exprs.len()
            )));
        }
        Ok(Self::new(
            build_exprs,
            probe_exprs,
            config.stores_nulls,
            config.finds_nulls,
            Arc::new(config.seed_table()),
        ))
    }

    pub fn stores_nulls(&self) -> bool {
        self.stores_nulls
    }

    pub fn finds_nulls(&self) -> bool {
        self.finds_nulls
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn seeds(&self) -> &SeedTable {
        &self.seeds
    }

    pub fn seed(&self) -> u32 {
        self.seeds.get(self.level).unwrap_or(0)
    }

    pub fn num_levels(&self) -> usize {
        self.seeds.len()
    }

    pub fn num_key_exprs(&self) -> usize {
        self.build_exprs.len()
    }

    /// Switches to the seed of `level`. Hashes computed at one level are
    /// meaningless at another, so a table must be rebuilt after this.
    pub fn set_level(&mut self, level: usize) {
        debug_assert!(
            level < self.seeds.len(),
            "level {level} out of range for {} seeds",
            self.seeds.len()
        );
        self.level = level;
    }

    /// Hashes `data` with the current level's hash function.
    pub fn hash(&self, data: &[u8], seed: u32) -> u32 {
        hash_bytes(data, seed, self.level)
    }

    pub fn current_key(&self) -> &[Value] {
        &self.key_values
    }

    pub fn current_key_has_null(&self) -> bool {
        self.key_nulls.iter().any(|&is_null| is_null)
    }

    /// Evaluates the build key of `row` and hashes it. Returns `None` when the
    /// key contains a null that this table does not store.
    pub fn evaluate_and_hash_build(&mut self, row: &Record) -> Option<u32> {
        self.evaluate(row, true);
        if self.current_key_has_null() && !self.stores_nulls {
            return None;
        }
        Some(self.hash_current_key())
    }

    /// Evaluates the probe key of `row` and hashes it. Returns `None` when the
    /// key contains a null that can never match a stored row.
    pub fn evaluate_and_hash_probe(&mut self, row: &Record) -> Option<u32> {
        self.evaluate(row, false);
        if self.current_key_has_null() && !(self.stores_nulls && self.finds_nulls) {
            return None;
        }
        Some(self.hash_current_key())
    }

    /// Returns true when the build key of `stored` equals the key evaluated
    /// last. Two nulls compare equal.
    pub fn equals(&self, stored: &Record) -> bool {
        key_matches(&self.build_exprs, &self.key_values, stored)
    }

    pub(crate) fn equals_row_ref(&mut self, row: &RowRef, store: Option<&dyn RowStore>) -> bool {
        match row {
            RowRef::Direct(record) => self.equals(record),
            RowRef::Indexed(idx) => {
                let Some(store) = store else {
                    return false;
                };
                if !store.materialize(*idx, &mut self.scratch_row) {
                    return false;
                }
                key_matches(&self.build_exprs, &self.key_values, &self.scratch_row)
            }
        }
    }

    fn evaluate(&mut self, row: &Record, build: bool) {
        let exprs = if build {
            &self.build_exprs
        } else {
            &self.probe_exprs
        };
        self.key_values.clear();
        self.key_nulls.clear();
        for expr in exprs.iter() {
            let value = expr.evaluate(row);
            self.key_nulls.push(value.is_null());
            self.key_values.push(value);
        }
    }

    fn hash_current_key(&mut self) -> u32 {
        let mut hash = self.seed();
        for value in &self.key_values {
            encode_key_value(value, &mut self.key_bytes);
            hash = hash_bytes(&self.key_bytes, hash, self.level);
        }
        hash
    }
}

impl Clone for HashTableCtx {
    fn clone(&self) -> Self {
        let num_keys = self.build_exprs.len();
        Self {
            build_exprs: Arc::clone(&self.build_exprs),
            probe_exprs: Arc::clone(&self.probe_exprs),
            stores_nulls: self.stores_nulls,
            finds_nulls: self.finds_nulls,
            level: self.level,
            seeds: Arc::clone(&self.seeds),
            key_values: Vec::with_capacity(num_keys),
            key_nulls: Vec::with_capacity(num_keys),
            key_bytes: Vec::new(),
            scratch_row: Record::new(),
        }
    }
}
