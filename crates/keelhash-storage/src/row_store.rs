use std::fmt;
use std::sync::Arc;

use keelhash_common::error::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{MemTracker, Record};

pub const DEFAULT_ROWS_PER_PAGE: usize = 1024;

/// Compact position of a row inside a [`RowStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowIdx {
    pub page: u32,
    pub offset: u32,
}

impl RowIdx {
    pub fn new(page: u32, offset: u32) -> Self {
        Self { page, offset }
    }
}

impl fmt::Display for RowIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page, self.offset)
    }
}

/// Append-only row storage that a hash table can reference by [`RowIdx`]
/// instead of holding the rows itself.
///
/// The table never allocates or frees rows here; it only records the indices
/// returned by `append` and later asks for them to be materialised into a
/// caller-owned scratch row.
pub trait RowStore: Send + Sync {
    fn append(&self, row: &Record) -> Result<RowIdx>;

    /// Copies the row at `idx` into `scratch`. Returns `false` when `idx` was
    /// not issued by this store; `scratch` is left untouched in that case.
    fn materialize(&self, idx: RowIdx, scratch: &mut Record) -> bool;

    fn num_rows(&self) -> usize;
}

/// In-memory [`RowStore`] made of fixed-size pages of rows.
pub struct PagedRowStore {
    rows_per_page: usize,
    pages: RwLock<Vec<Vec<Record>>>,
    mem_tracker: Option<Arc<MemTracker>>,
}

impl PagedRowStore {
    pub fn new() -> Self {
        Self::with_rows_per_page(DEFAULT_ROWS_PER_PAGE)
    }

    pub fn with_rows_per_page(rows_per_page: usize) -> Self {
        Self {
            rows_per_page: rows_per_page.max(1),
            pages: RwLock::new(Vec::new()),
            mem_tracker: None,
        }
    }

    pub fn with_mem_tracker(mut self, mem_tracker: Arc<MemTracker>) -> Self {
        self.mem_tracker = Some(mem_tracker);
        self
    }

    pub fn rows_per_page(&self) -> usize {
        self.rows_per_page
    }

    pub fn num_pages(&self) -> usize {
        self.pages.read().len()
    }

    pub fn get(&self, idx: RowIdx) -> Option<Record> {
        let pages = self.pages.read();
        pages
            .get(idx.page as usize)
            .and_then(|page| page.get(idx.offset as usize))
            .cloned()
    }
}

impl Default for PagedRowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RowStore for PagedRowStore {
    fn append(&self, row: &Record) -> Result<RowIdx> {
        let row = row.clone();
        let bytes = row.estimated_size() as u64;
        if let Some(tracker) = &self.mem_tracker {
            if !tracker.try_consume(bytes) {
                return Err(Error::mem_limit_exceeded(bytes, tracker.remaining()));
            }
        }

        let mut pages = self.pages.write();
        let needs_page = pages
            .last()
            .is_none_or(|page| page.len() >= self.rows_per_page);
        if needs_page {
            pages.push(Vec::with_capacity(self.rows_per_page));
        }
        let page = pages.len() - 1;
        let rows = &mut pages[page];
        let offset = rows.len();
        rows.push(row);

        let page = u32::try_from(page).map_err(|_| Error::internal("row store page overflow"))?;
        Ok(RowIdx::new(page, offset as u32))
    }

    fn materialize(&self, idx: RowIdx, scratch: &mut Record) -> bool {
        let pages = self.pages.read();
        match pages
            .get(idx.page as usize)
            .and_then(|page| page.get(idx.offset as usize))
        {
            Some(row) => {
                scratch.copy_from(row);
                true
            }
            None => false,
        }
    }

    fn num_rows(&self) -> usize {
        self.pages.read().iter().map(Vec::len).sum()
    }
}

impl Drop for PagedRowStore {
    fn drop(&mut self) {
        if let Some(tracker) = &self.mem_tracker {
            let bytes: usize = self
                .pages
                .get_mut()
                .iter()
                .flatten()
                .map(Record::estimated_size)
                .sum();
            tracker.release(bytes as u64);
        }
    }
}

impl fmt::Debug for PagedRowStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedRowStore")
            .field("rows_per_page", &self.rows_per_page)
            .field("num_pages", &self.num_pages())
            .field("num_rows", &self.num_rows())
            .finish()
    }
}
