//! Build-side hash index for hash joins and hash aggregation.
//!
//! Rows are stored in an open-addressing bucket array. Rows with equal keys
//! share one bucket: the first row is kept inline, further rows move the
//! bucket onto a chain of overflow nodes allocated from a [`NodeArena`].

mod arena;
mod bucket;
mod config;
mod ctx;
mod cursor;
mod stats;

use std::fmt;
use std::mem;
use std::sync::Arc;

pub use arena::{MAX_PAGE_NODES, MIN_PAGE_NODES, NodeArena, NodeIndex, OverflowNode};
pub use bucket::{Bucket, RowRef};
pub use config::{
    DEFAULT_INITIAL_NUM_BUCKETS, DEFAULT_INITIAL_SEED, DEFAULT_NUM_LEVELS, HashTableConfig,
    ProbingMode, StorageMode,
};
pub use ctx::{HashTableCtx, SeedTable, hash_bytes};
pub use cursor::Cursor;
use keelhash_common::error::{Error, Result};
use keelhash_storage::{MemTracker, Record, RowIdx, RowStore};
pub use stats::HashTableStats;
use tracing::{debug, instrument, warn};

pub const MAX_NUM_BUCKETS: usize = 1 << 30;

/// Highest ratio of filled buckets to buckets that `resize` and
/// `check_and_resize` will produce.
pub const MAX_FILL_FACTOR: f64 = 0.75;

fn within_fill_factor(num_filled: usize, num_buckets: usize) -> bool {
    (num_filled as u128) * 4 <= (num_buckets as u128) * 3
}

fn bucket_array_bytes(num_buckets: usize) -> u64 {
    (num_buckets * mem::size_of::<Bucket>()) as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// A bucket with an equal hash and key.
    Found(usize),
    /// The empty bucket where the key would be inserted.
    Vacant(usize),
    /// Every bucket was visited without finding the key or an empty slot.
    Exhausted,
}

#[derive(Debug, Clone, Copy, Default)]
struct ProbeCounters {
    num_probes: u64,
    num_hash_collisions: u64,
    travel_length: u64,
}

fn probe_buckets(
    buckets: &[Bucket],
    probing_mode: ProbingMode,
    hash: u32,
    counters: &mut ProbeCounters,
    mut matches: impl FnMut(&Bucket) -> bool,
) -> ProbeResult {
    let num_buckets = buckets.len();
    debug_assert!(num_buckets.is_power_of_two());
    let mask = num_buckets - 1;
    let mut idx = hash as usize & mask;
    let mut step = 0;
    counters.num_probes += 1;
    while step < num_buckets {
        let bucket = &buckets[idx];
        match bucket.hash() {
            None => return ProbeResult::Vacant(idx),
            Some(bucket_hash) if bucket_hash == hash => {
                if matches(bucket) {
                    return ProbeResult::Found(idx);
                }
                counters.num_hash_collisions += 1;
            }
            Some(_) => {}
        }
        step += 1;
        counters.travel_length += 1;
        idx = match probing_mode {
            ProbingMode::Linear => (idx + 1) & mask,
            ProbingMode::Quadratic => (idx + step) & mask,
        };
    }
    debug_assert!(
        buckets.iter().all(Bucket::is_filled),
        "probe visited every bucket of a table that is not full"
    );
    ProbeResult::Exhausted
}

/// Open-addressing hash index over build rows.
///
/// The table never grows on its own. Callers size it up front with
/// [`estimate_num_buckets`](Self::estimate_num_buckets) or call
/// [`check_and_resize`](Self::check_and_resize) before each batch of inserts;
/// an insert into a full table fails.
pub struct HashTable {
    buckets: Vec<Bucket>,
    arena: NodeArena,
    probing_mode: ProbingMode,
    storage_mode: StorageMode,
    row_store: Option<Arc<dyn RowStore>>,
    mem_tracker: Arc<MemTracker>,
    bucket_bytes: u64,
    num_filled_buckets: usize,
    num_entries: usize,
    num_buckets_with_overflow: usize,
    has_matches: bool,
    counters: ProbeCounters,
    num_resizes: u64,
}

impl HashTable {
    /// Creates a table that keeps its rows in memory.
    pub fn new(config: &HashTableConfig, mem_tracker: Arc<MemTracker>) -> Result<Self> {
        if config.storage_mode != StorageMode::Direct {
            return Err(Error::invalid_config(
                "indexed storage requires a row store; use HashTable::with_row_store",
            ));
        }
        Self::create(config, mem_tracker, None)
    }

    /// Creates a table that stores indices into `row_store` instead of rows.
    pub fn with_row_store(
        config: &HashTableConfig,
        mem_tracker: Arc<MemTracker>,
        row_store: Arc<dyn RowStore>,
    ) -> Result<Self> {
        if config.storage_mode != StorageMode::Indexed {
            return Err(Error::invalid_config(
                "a row store can only back a table with indexed storage",
            ));
        }
        Self::create(config, mem_tracker, Some(row_store))
    }

    fn create(
        config: &HashTableConfig,
        mem_tracker: Arc<MemTracker>,
        row_store: Option<Arc<dyn RowStore>>,
    ) -> Result<Self> {
        config.validate()?;
        let num_buckets = config.effective_num_buckets();
        let bytes = bucket_array_bytes(num_buckets);
        if !mem_tracker.try_consume(bytes) {
            let remaining = mem_tracker.remaining();
            warn!(num_buckets, requested = bytes, remaining, "hash table allocation refused");
            return Err(Error::mem_limit_exceeded(bytes, remaining));
        }
        debug!(
            num_buckets,
            probing_mode = ?config.probing_mode,
            storage_mode = ?config.storage_mode,
            "created hash table"
        );
        Ok(Self {
            buckets: vec![Bucket::Empty; num_buckets],
            arena: NodeArena::new(Arc::clone(&mem_tracker)),
            probing_mode: config.probing_mode,
            storage_mode: config.storage_mode,
            row_store,
            mem_tracker,
            bucket_bytes: bytes,
            num_filled_buckets: 0,
            num_entries: 0,
            num_buckets_with_overflow: 0,
            has_matches: false,
            counters: ProbeCounters::default(),
            num_resizes: 0,
        })
    }

    /// Smallest power-of-two bucket count that holds `num_rows` distinct keys
    /// within [`MAX_FILL_FACTOR`].
    pub fn estimate_num_buckets(num_rows: usize) -> usize {
        num_rows
            .saturating_mul(4)
            .div_ceil(3)
            .max(1)
            .next_power_of_two()
    }

    /// Upper bound on the bytes needed to index `num_rows` rows.
    pub fn estimate_size(num_rows: usize) -> u64 {
        bucket_array_bytes(Self::estimate_num_buckets(num_rows))
            + (num_rows * mem::size_of::<OverflowNode>()) as u64
    }

    pub fn probing_mode(&self) -> ProbingMode {
        self.probing_mode
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.storage_mode
    }

    pub fn row_store(&self) -> Option<&Arc<dyn RowStore>> {
        self.row_store.as_ref()
    }

    pub fn mem_tracker(&self) -> &Arc<MemTracker> {
        &self.mem_tracker
    }

    /// Number of rows in the table, duplicates included.
    pub fn size(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn num_filled_buckets(&self) -> usize {
        self.num_filled_buckets
    }

    pub fn empty_buckets(&self) -> usize {
        self.buckets.len() - self.num_filled_buckets
    }

    pub fn num_buckets_with_overflow(&self) -> usize {
        self.num_buckets_with_overflow
    }

    pub fn num_overflow_nodes(&self) -> usize {
        self.arena.num_nodes()
    }

    /// True once any cursor has marked an entry as matched.
    pub fn has_matches(&self) -> bool {
        self.has_matches
    }

    /// Bytes charged to the memory tracker by this table.
    pub fn byte_size(&self) -> u64 {
        self.bucket_bytes + self.arena.allocated_bytes()
    }

    pub fn load_factor(&self) -> f64 {
        self.num_filled_buckets as f64 / self.buckets.len() as f64
    }

    pub fn stats(&self) -> HashTableStats {
        HashTableStats {
            num_buckets: self.buckets.len(),
            num_filled_buckets: self.num_filled_buckets,
            num_entries: self.num_entries,
            num_buckets_with_overflow: self.num_buckets_with_overflow,
            num_overflow_nodes: self.arena.num_nodes(),
            num_probes: self.counters.num_probes,
            num_hash_collisions: self.counters.num_hash_collisions,
            travel_length: self.counters.travel_length,
            num_resizes: self.num_resizes,
            byte_size: self.byte_size(),
        }
    }

    /// Looks up `hash` in the bucket array. With a context, a bucket whose
    /// hash matches is also compared by key against the context's current
    /// key; without one, a matching hash never counts as found and the probe
    /// runs on to an empty bucket.
    pub fn probe(&mut self, ctx: Option<&mut HashTableCtx>, hash: u32) -> ProbeResult {
        let Self {
            buckets,
            arena,
            row_store,
            counters,
            probing_mode,
            ..
        } = self;
        match ctx {
            Some(ctx) => {
                let store = row_store.as_deref();
                probe_buckets(buckets, *probing_mode, hash, counters, |bucket| {
                    bucket
                        .first_row(arena)
                        .is_some_and(|row| ctx.equals_row_ref(row, store))
                })
            }
            None => probe_buckets(buckets, *probing_mode, hash, counters, |_| false),
        }
    }

    /// Inserts `row` under `hash`, which must come from
    /// [`HashTableCtx::evaluate_and_hash_build`] on the same row.
    ///
    /// Returns false without changing the table when the table is full and
    /// the key is new, when an overflow node cannot be allocated, or when
    /// `row` does not match the table's storage mode.
    pub fn insert(&mut self, ctx: &mut HashTableCtx, row: RowRef, hash: u32) -> bool {
        if row.storage_mode() != self.storage_mode {
            warn!(
                expected = ?self.storage_mode,
                actual = ?row.storage_mode(),
                "row reference does not match table storage mode"
            );
            return false;
        }
        match self.probe(Some(ctx), hash) {
            ProbeResult::Vacant(idx) => {
                self.buckets[idx] = Bucket::Inline {
                    hash,
                    matched: false,
                    row,
                };
                self.num_filled_buckets += 1;
                self.num_entries += 1;
                true
            }
            ProbeResult::Found(idx) => self.insert_duplicate(idx, row),
            ProbeResult::Exhausted => {
                debug!(num_buckets = self.buckets.len(), "insert into full hash table");
                false
            }
        }
    }

    pub fn insert_row(&mut self, ctx: &mut HashTableCtx, row: Arc<Record>, hash: u32) -> bool {
        self.insert(ctx, RowRef::Direct(row), hash)
    }

    pub fn insert_idx(&mut self, ctx: &mut HashTableCtx, idx: RowIdx, hash: u32) -> bool {
        self.insert(ctx, RowRef::Indexed(idx), hash)
    }

    fn insert_duplicate(&mut self, idx: usize, row: RowRef) -> bool {
        let (hash, chain_head) = match &self.buckets[idx] {
            Bucket::Empty => return false,
            Bucket::Inline { hash, .. } => (*hash, None),
            Bucket::Chain { hash, head } => (*hash, Some(*head)),
        };

        let new_head = match chain_head {
            Some(head) => {
                if !self.arena.reserve(1) {
                    return self.overflow_alloc_failed();
                }
                self.arena.alloc(OverflowNode {
                    row,
                    matched: false,
                    next: Some(head),
                })
            }
            None => {
                if !self.arena.reserve(2) {
                    return self.overflow_alloc_failed();
                }
                let Bucket::Inline {
                    matched,
                    row: existing,
                    ..
                } = &self.buckets[idx]
                else {
                    return false;
                };
                let tail = OverflowNode {
                    row: existing.clone(),
                    matched: *matched,
                    next: None,
                };
                self.arena.alloc(tail).and_then(|tail| {
                    self.arena.alloc(OverflowNode {
                        row,
                        matched: false,
                        next: Some(tail),
                    })
                })
            }
        };
        let Some(head) = new_head else {
            return self.overflow_alloc_failed();
        };

        if chain_head.is_none() {
            self.num_buckets_with_overflow += 1;
        }
        self.buckets[idx] = Bucket::Chain { hash, head };
        self.num_entries += 1;
        true
    }

    fn overflow_alloc_failed(&self) -> bool {
        warn!(
            num_entries = self.num_entries,
            overflow_nodes = self.arena.num_nodes(),
            remaining = self.mem_tracker.remaining(),
            "overflow node allocation failed"
        );
        false
    }

    /// Positions a cursor on the rows whose key equals the context's current
    /// key, or at the end when there are none.
    pub fn find<'a>(&'a mut self, ctx: &'a mut HashTableCtx, hash: u32) -> Cursor<'a> {
        let bucket_idx = match self.probe(Some(&mut *ctx), hash) {
            ProbeResult::Found(idx) => Some(idx),
            ProbeResult::Vacant(_) | ProbeResult::Exhausted => None,
        };
        Cursor::at_bucket(self, &mut ctx.scratch_row, bucket_idx)
    }

    /// Positions a cursor on the first row in bucket order.
    pub fn begin<'a>(&'a mut self, ctx: &'a mut HashTableCtx) -> Cursor<'a> {
        Cursor::begin(self, &mut ctx.scratch_row)
    }

    /// Positions a cursor on the first row whose matched bit is not set.
    pub fn first_unmatched<'a>(&'a mut self, ctx: &'a mut HashTableCtx) -> Cursor<'a> {
        let mut cursor = Cursor::begin(self, &mut ctx.scratch_row);
        if !cursor.at_end() && cursor.is_matched() {
            cursor.next_unmatched();
        }
        cursor
    }

    /// Moves every bucket into a new array of `new_num_buckets` buckets.
    ///
    /// Chains and matched bits move with their bucket. Fails without touching
    /// the table when the count is not a power of two, when the filled
    /// buckets would exceed [`MAX_FILL_FACTOR`] of it, or when the new array
    /// cannot be charged to the memory tracker.
    #[instrument(
        skip(self),
        fields(num_buckets = self.buckets.len(), num_filled = self.num_filled_buckets)
    )]
    pub fn resize(&mut self, new_num_buckets: usize) -> Result<()> {
        if !new_num_buckets.is_power_of_two() || new_num_buckets > MAX_NUM_BUCKETS {
            return Err(Error::invalid_capacity(format!(
                "bucket count {new_num_buckets} is not a power of two no larger than {MAX_NUM_BUCKETS}"
            )));
        }
        if !within_fill_factor(self.num_filled_buckets, new_num_buckets) {
            return Err(Error::invalid_capacity(format!(
                "{} filled buckets do not fit in {new_num_buckets} buckets",
                self.num_filled_buckets
            )));
        }

        let bytes = bucket_array_bytes(new_num_buckets);
        if !self.mem_tracker.try_consume(bytes) {
            let remaining = self.mem_tracker.remaining();
            warn!(requested = bytes, remaining, "bucket array allocation refused");
            return Err(Error::mem_limit_exceeded(bytes, remaining));
        }

        let mut new_buckets = vec![Bucket::Empty; new_num_buckets];
        let mut relocation = ProbeCounters::default();
        for bucket in &self.buckets {
            let Some(hash) = bucket.hash() else {
                continue;
            };
            match probe_buckets(&new_buckets, self.probing_mode, hash, &mut relocation, |_| false) {
                ProbeResult::Vacant(idx) => new_buckets[idx] = bucket.clone(),
                ProbeResult::Found(_) | ProbeResult::Exhausted => {
                    self.mem_tracker.release(bytes);
                    return Err(Error::internal("no empty bucket left while resizing"));
                }
            }
        }

        self.buckets = new_buckets;
        self.mem_tracker.release(self.bucket_bytes);
        self.bucket_bytes = bytes;
        self.num_resizes += 1;
        debug!(new_num_buckets, "resized hash table");
        Ok(())
    }

    /// Grows the table, doubling the bucket count as often as needed, so that
    /// `buckets_to_fill` more buckets can be filled within
    /// [`MAX_FILL_FACTOR`]. Does nothing when the table is already big enough.
    pub fn check_and_resize(&mut self, buckets_to_fill: usize) -> Result<()> {
        let needed = self.num_filled_buckets.saturating_add(buckets_to_fill);
        let mut new_num_buckets = self.buckets.len();
        while !within_fill_factor(needed, new_num_buckets) {
            if new_num_buckets >= MAX_NUM_BUCKETS {
                return Err(Error::invalid_capacity(format!(
                    "{needed} filled buckets exceed the largest table of {MAX_NUM_BUCKETS} buckets"
                )));
            }
            new_num_buckets <<= 1;
        }
        if new_num_buckets == self.buckets.len() {
            return Ok(());
        }
        self.resize(new_num_buckets)
    }

    /// Removes every row but keeps the bucket array.
    pub fn clear(&mut self) {
        self.buckets.fill(Bucket::Empty);
        self.arena.release();
        self.num_filled_buckets = 0;
        self.num_entries = 0;
        self.num_buckets_with_overflow = 0;
        self.has_matches = false;
    }

    /// Releases the bucket array and all overflow nodes.
    pub fn close(self) {
        debug!(stats = %self.stats(), "closing hash table");
    }
}

impl Drop for HashTable {
    fn drop(&mut self) {
        self.mem_tracker.release(self.bucket_bytes);
        self.bucket_bytes = 0;
    }
}

impl fmt::Debug for HashTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashTable")
            .field("num_buckets", &self.buckets.len())
            .field("num_entries", &self.num_entries)
            .field("probing_mode", &self.probing_mode)
            .field("storage_mode", &self.storage_mode)
            .field("has_matches", &self.has_matches)
            .finish()
    }
}
