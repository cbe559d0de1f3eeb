pub mod hash_table;
mod key_expr;

pub use hash_table::{
    Bucket, Cursor, HashTable, HashTableConfig, HashTableCtx, HashTableStats, MAX_FILL_FACTOR,
    MAX_NUM_BUCKETS, NodeArena, NodeIndex, OverflowNode, ProbeResult, ProbingMode, RowRef,
    SeedTable, StorageMode,
};
pub use key_expr::{ColumnRef, KeyExpr, Literal};
