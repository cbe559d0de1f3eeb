use std::sync::Arc;

use keelhash_storage::{Record, RowIdx};

use super::arena::{NodeArena, NodeIndex};
use super::config::StorageMode;

/// Reference to a build row, in the representation fixed by the table's
/// [`StorageMode`].
#[derive(Debug, Clone)]
pub enum RowRef {
    Direct(Arc<Record>),
    Indexed(RowIdx),
}

impl RowRef {
    pub fn storage_mode(&self) -> StorageMode {
        match self {
            RowRef::Direct(_) => StorageMode::Direct,
            RowRef::Indexed(_) => StorageMode::Indexed,
        }
    }

    pub fn as_direct(&self) -> Option<&Arc<Record>> {
        match self {
            RowRef::Direct(row) => Some(row),
            RowRef::Indexed(_) => None,
        }
    }

    pub fn as_indexed(&self) -> Option<RowIdx> {
        match self {
            RowRef::Direct(_) => None,
            RowRef::Indexed(idx) => Some(*idx),
        }
    }
}

/// Identity comparison: two direct references are equal only when they
/// point at the same row.
impl PartialEq for RowRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RowRef::Direct(a), RowRef::Direct(b)) => Arc::ptr_eq(a, b),
            (RowRef::Indexed(a), RowRef::Indexed(b)) => a == b,
            (RowRef::Direct(_), RowRef::Indexed(_)) | (RowRef::Indexed(_), RowRef::Direct(_)) => {
                false
            }
        }
    }
}

impl Eq for RowRef {}

impl From<Arc<Record>> for RowRef {
    fn from(row: Arc<Record>) -> Self {
        RowRef::Direct(row)
    }
}

impl From<RowIdx> for RowRef {
    fn from(idx: RowIdx) -> Self {
        RowRef::Indexed(idx)
    }
}

#[derive(Debug, Clone, Default)]
pub enum Bucket {
    #[default]
    Empty,
    Inline {
        hash: u32,
        matched: bool,
        row: RowRef,
    },
    /// Two or more rows with equal keys; `head` is the most recent.
    Chain { hash: u32, head: NodeIndex },
}

impl Bucket {
    pub fn is_filled(&self) -> bool {
        !matches!(self, Bucket::Empty)
    }

    pub fn has_overflow(&self) -> bool {
        matches!(self, Bucket::Chain { .. })
    }

    pub fn hash(&self) -> Option<u32> {
        match self {
            Bucket::Empty => None,
            Bucket::Inline { hash, .. } | Bucket::Chain { hash, .. } => Some(*hash),
        }
    }

    /// First row of the bucket: the inline row or the head of the chain.
    pub fn first_row<'a>(&'a self, arena: &'a NodeArena) -> Option<&'a RowRef> {
        match self {
            Bucket::Empty => None,
            Bucket::Inline { row, .. } => Some(row),
            Bucket::Chain { head, .. } => Some(&arena.get(*head).row),
        }
    }
}
