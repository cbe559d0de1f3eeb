use std::sync::Arc;

use keelhash_storage::Record;

use super::HashTable;
use super::arena::NodeIndex;
use super::bucket::{Bucket, RowRef};

/// Position in a [`HashTable`]: a filled bucket, plus the current overflow
/// node when the bucket holds a chain. A cursor past the last bucket is at
/// the end.
///
/// Rows are visited in bucket order, and within a chain from the most
/// recently inserted row to the oldest.
#[derive(Debug)]
pub struct Cursor<'a> {
    table: &'a mut HashTable,
    scratch_row: &'a mut Record,
    bucket_idx: Option<usize>,
    node: Option<NodeIndex>,
}

impl<'a> Cursor<'a> {
    pub(super) fn at_bucket(
        table: &'a mut HashTable,
        scratch_row: &'a mut Record,
        bucket_idx: Option<usize>,
    ) -> Self {
        let mut cursor = Self {
            table,
            scratch_row,
            bucket_idx: None,
            node: None,
        };
        if let Some(idx) = bucket_idx {
            cursor.position(idx);
        }
        cursor
    }

    pub(super) fn begin(table: &'a mut HashTable, scratch_row: &'a mut Record) -> Self {
        let mut cursor = Self::at_bucket(table, scratch_row, None);
        cursor.seek_filled(0);
        cursor
    }

    fn position(&mut self, idx: usize) {
        self.bucket_idx = Some(idx);
        self.node = match &self.table.buckets[idx] {
            Bucket::Chain { head, .. } => Some(*head),
            Bucket::Empty | Bucket::Inline { .. } => None,
        };
    }

    fn seek_filled(&mut self, start: usize) {
        let found = self
            .table
            .buckets
            .get(start..)
            .and_then(|rest| rest.iter().position(Bucket::is_filled));
        match found {
            Some(offset) => self.position(start + offset),
            None => self.set_end(),
        }
    }

    fn set_end(&mut self) {
        self.bucket_idx = None;
        self.node = None;
    }

    fn next_in_chain(&self) -> Option<NodeIndex> {
        self.node.and_then(|node| self.table.arena.get(node).next)
    }

    pub fn at_end(&self) -> bool {
        self.bucket_idx.is_none()
    }

    pub fn bucket_index(&self) -> Option<usize> {
        self.bucket_idx
    }

    pub fn hash(&self) -> Option<u32> {
        self.bucket_idx.and_then(|idx| self.table.buckets[idx].hash())
    }

    /// Advances to the next row: the next node of the current chain, or the
    /// first row of the next filled bucket.
    pub fn next(&mut self) {
        let Some(idx) = self.bucket_idx else {
            return;
        };
        match self.next_in_chain() {
            Some(next) => self.node = Some(next),
            None => self.seek_filled(idx + 1),
        }
    }

    /// Advances to the next row with the same key. Reaches the end when the
    /// current bucket has no more rows, even if other buckets follow.
    pub fn next_duplicate(&mut self) {
        match self.next_in_chain() {
            Some(next) => self.node = Some(next),
            None => self.set_end(),
        }
    }

    /// Advances to the next row whose matched bit is clear.
    pub fn next_unmatched(&mut self) {
        self.next();
        while !self.at_end() && self.is_matched() {
            self.next();
        }
    }

    pub fn is_matched(&self) -> bool {
        let Some(idx) = self.bucket_idx else {
            return false;
        };
        match self.node {
            Some(node) => self.table.arena.get(node).matched,
            None => matches!(self.table.buckets[idx], Bucket::Inline { matched: true, .. }),
        }
    }

    pub fn set_matched(&mut self) {
        let Some(idx) = self.bucket_idx else {
            return;
        };
        match self.node {
            Some(node) => self.table.arena.get_mut(node).matched = true,
            None => {
                if let Bucket::Inline { matched, .. } = &mut self.table.buckets[idx] {
                    *matched = true;
                }
            }
        }
        self.table.has_matches = true;
    }

    pub fn get_row_reference(&self) -> Option<&RowRef> {
        let idx = self.bucket_idx?;
        match self.node {
            Some(node) => Some(&self.table.arena.get(node).row),
            None => self.table.buckets[idx].first_row(&self.table.arena),
        }
    }

    /// The current row. Indexed rows are materialised into the scratch row
    /// of the context the cursor was created from and stay valid until the
    /// next call.
    pub fn get_row(&mut self) -> Option<&Record> {
        match self.get_row_reference()?.as_indexed() {
            None => self
                .get_row_reference()
                .and_then(RowRef::as_direct)
                .map(Arc::as_ref),
            Some(idx) => {
                let store = self.table.row_store.as_deref()?;
                if store.materialize(idx, &mut *self.scratch_row) {
                    Some(&*self.scratch_row)
                } else {
                    None
                }
            }
        }
    }
}
