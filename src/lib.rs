//! keelhash - the build-side hash index of a parallel SQL execution engine.
//!
//! A join or aggregation operator builds a [`HashTable`] from its build-side
//! rows and probes it with rows from the other side. Key expressions are
//! evaluated and hashed by a [`HashTableCtx`]; rows with equal keys share a
//! bucket and are enumerated with a [`Cursor`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use keelhash::{
//!     ColumnRef, DataType, HashTable, HashTableConfig, HashTableCtx, KeyExpr, MemTracker,
//!     Record, Value,
//! };
//!
//! let config = HashTableConfig::quadratic(16);
//! let key = || -> Vec<Box<dyn KeyExpr>> { vec![Box::new(ColumnRef::new(0, DataType::Int64))] };
//! let mut ctx = HashTableCtx::from_config(&config, key(), key()).unwrap();
//! let mut table = HashTable::new(&config, Arc::new(MemTracker::unlimited("join"))).unwrap();
//!
//! let row = Arc::new(Record::from_values(vec![Value::int64(7), Value::string("seven")]));
//! let hash = ctx.evaluate_and_hash_build(&row).unwrap();
//! assert!(table.insert_row(&mut ctx, row, hash));
//!
//! let probe = Record::from_values(vec![Value::int64(7)]);
//! let hash = ctx.evaluate_and_hash_probe(&probe).unwrap();
//! let mut cursor = table.find(&mut ctx, hash);
//! assert_eq!(cursor.get_row().map(|r| r[1].clone()), Some(Value::string("seven")));
//! ```

pub use keelhash_common::error::{Error, Result};
pub use keelhash_common::types::{DataType, Value};
pub use keelhash_executor::hash_table::{MAX_PAGE_NODES, MIN_PAGE_NODES, hash_bytes};
pub use keelhash_executor::{
    Bucket, ColumnRef, Cursor, HashTable, HashTableConfig, HashTableCtx, HashTableStats, KeyExpr,
    Literal, MAX_FILL_FACTOR, MAX_NUM_BUCKETS, NodeArena, NodeIndex, OverflowNode, ProbeResult,
    ProbingMode, RowRef, SeedTable, StorageMode,
};
pub use keelhash_storage::{MemTracker, PagedRowStore, Record, RowIdx, RowStore};
