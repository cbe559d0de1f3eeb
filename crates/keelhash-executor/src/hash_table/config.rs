use std::sync::Arc;

use keelhash_common::error::{Error, Result};
use keelhash_storage::MemTracker;
use serde::{Deserialize, Serialize};

use super::MAX_NUM_BUCKETS;
use super::ctx::SeedTable;

pub const DEFAULT_INITIAL_NUM_BUCKETS: usize = 1024;
pub const DEFAULT_NUM_LEVELS: usize = 4;
pub const DEFAULT_INITIAL_SEED: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbingMode {
    Linear,
    #[default]
    Quadratic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Direct,
    Indexed,
}

/// Construction parameters for a [`HashTable`](super::HashTable) and its
/// [`HashTableCtx`](super::HashTableCtx).
///
/// Every field has a default, so a TOML document only needs the keys it
/// changes:
///
/// ```toml
/// initial_num_buckets = 4096
/// probing_mode = "linear"
/// stores_nulls = true
/// mem_limit_bytes = 67108864
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HashTableConfig {
    /// Rounded up to a power of two when the table is created.
    pub initial_num_buckets: usize,
    pub probing_mode: ProbingMode,
    pub storage_mode: StorageMode,
    /// Build rows with a null key are inserted instead of skipped.
    pub stores_nulls: bool,
    /// Probe rows with a null key may match stored null keys.
    pub finds_nulls: bool,
    pub num_build_key_exprs: usize,
    pub num_probe_key_exprs: usize,
    /// Number of repartitioning levels, i.e. the size of the seed table.
    pub num_levels: usize,
    pub initial_seed: u32,
    pub mem_limit_bytes: Option<u64>,
}

impl Default for HashTableConfig {
    fn default() -> Self {
        Self {
            initial_num_buckets: DEFAULT_INITIAL_NUM_BUCKETS,
            probing_mode: ProbingMode::default(),
            storage_mode: StorageMode::default(),
            stores_nulls: false,
            finds_nulls: false,
            num_build_key_exprs: 1,
            num_probe_key_exprs: 1,
            num_levels: DEFAULT_NUM_LEVELS,
            initial_seed: DEFAULT_INITIAL_SEED,
            mem_limit_bytes: None,
        }
    }
}

impl HashTableConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn linear(initial_num_buckets: usize) -> Self {
        Self::default()
            .with_probing_mode(ProbingMode::Linear)
            .with_initial_num_buckets(initial_num_buckets)
    }

    pub fn quadratic(initial_num_buckets: usize) -> Self {
        Self::default()
            .with_probing_mode(ProbingMode::Quadratic)
            .with_initial_num_buckets(initial_num_buckets)
    }

    pub fn with_initial_num_buckets(mut self, initial_num_buckets: usize) -> Self {
        self.initial_num_buckets = initial_num_buckets;
        self
    }

    pub fn with_probing_mode(mut self, probing_mode: ProbingMode) -> Self {
        self.probing_mode = probing_mode;
        self
    }

    pub fn with_storage_mode(mut self, storage_mode: StorageMode) -> Self {
        self.storage_mode = storage_mode;
        self
    }

    pub fn with_null_handling(mut self, stores_nulls: bool, finds_nulls: bool) -> Self {
        self.stores_nulls = stores_nulls;
        self.finds_nulls = finds_nulls;
        self
    }

    pub fn with_num_key_exprs(mut self, num_key_exprs: usize) -> Self {
        self.num_build_key_exprs = num_key_exprs;
        self.num_probe_key_exprs = num_key_exprs;
        self
    }

    pub fn with_num_levels(mut self, num_levels: usize) -> Self {
        self.num_levels = num_levels;
        self
    }

    pub fn with_initial_seed(mut self, initial_seed: u32) -> Self {
        self.initial_seed = initial_seed;
        self
    }

    pub fn with_mem_limit(mut self, mem_limit_bytes: u64) -> Self {
        self.mem_limit_bytes = Some(mem_limit_bytes);
        self
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| Error::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_build_key_exprs == 0 {
            return Err(Error::invalid_config("at least one key expression is required"));
        }
        if self.num_build_key_exprs != self.num_probe_key_exprs {
            return Err(Error::invalid_config(format!(
                "build side has {} key expressions but probe side has {}",
                self.num_build_key_exprs, self.num_probe_key_exprs
            )));
        }
        if self.finds_nulls && !self.stores_nulls {
            return Err(Error::invalid_config(
                "finds_nulls requires stores_nulls",
            ));
        }
        if self.num_levels == 0 {
            return Err(Error::invalid_config("num_levels must be at least 1"));
        }
        if self.initial_num_buckets > MAX_NUM_BUCKETS {
            return Err(Error::invalid_config(format!(
                "initial_num_buckets {} exceeds the maximum of {}",
                self.initial_num_buckets, MAX_NUM_BUCKETS
            )));
        }
        Ok(())
    }

    /// Bucket count the table starts with: the configured count rounded up
    /// to a power of two, at least one.
    pub fn effective_num_buckets(&self) -> usize {
        self.initial_num_buckets.max(1).next_power_of_two()
    }

    pub fn mem_tracker(&self, label: impl Into<String>) -> Arc<MemTracker> {
        Arc::new(MemTracker::new(label, self.mem_limit_bytes))
    }

    pub fn seed_table(&self) -> SeedTable {
        SeedTable::new(self.initial_seed, self.num_levels)
    }
}
