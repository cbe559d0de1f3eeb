use std::fmt;

/// Snapshot of a table's occupancy and probe counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HashTableStats {
    pub num_buckets: usize,
    pub num_filled_buckets: usize,
    pub num_entries: usize,
    pub num_buckets_with_overflow: usize,
    pub num_overflow_nodes: usize,
    pub num_probes: u64,
    pub num_hash_collisions: u64,
    pub travel_length: u64,
    pub num_resizes: u64,
    pub byte_size: u64,
}

impl HashTableStats {
    pub fn load_factor(&self) -> f64 {
        if self.num_buckets == 0 {
            return 0.0;
        }
        self.num_filled_buckets as f64 / self.num_buckets as f64
    }

    /// Average number of extra buckets visited per probe.
    pub fn avg_travel_length(&self) -> f64 {
        if self.num_probes == 0 {
            return 0.0;
        }
        self.travel_length as f64 / self.num_probes as f64
    }
}

impl fmt::Display for HashTableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buckets: {} ({} filled, {} with overflow, load factor {:.2}) \
             Entries: {} ({} overflow nodes) \
             Probes: {} (avg travel {:.2}, {} hash collisions) \
             Resizes: {} Bytes: {}",
            self.num_buckets,
            self.num_filled_buckets,
            self.num_buckets_with_overflow,
            self.load_factor(),
            self.num_entries,
            self.num_overflow_nodes,
            self.num_probes,
            self.avg_travel_length(),
            self.num_hash_collisions,
            self.num_resizes,
            self.byte_size,
        )
    }
}
