use std::mem;
use std::sync::Arc;

use keelhash_storage::MemTracker;
use tracing::debug;

use super::bucket::RowRef;

pub const MIN_PAGE_NODES: usize = 1024;
pub const MAX_PAGE_NODES: usize = 1 << 18;

/// Position of an [`OverflowNode`] inside a [`NodeArena`]. Stable for the
/// life of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex {
    page: u32,
    slot: u32,
}

impl NodeIndex {
    pub fn new(page: u32, slot: u32) -> Self {
        Self { page, slot }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }
}

#[derive(Debug, Clone)]
pub struct OverflowNode {
    pub row: RowRef,
    pub matched: bool,
    pub next: Option<NodeIndex>,
}

/// Bump allocator for overflow nodes.
///
/// Nodes live in pages that are never resized after creation, so a
/// [`NodeIndex`] stays valid until the whole arena is released. Page sizes
/// double from [`MIN_PAGE_NODES`] up to [`MAX_PAGE_NODES`]. Every page is
/// charged to the memory tracker before it is allocated.
#[derive(Debug)]
pub struct NodeArena {
    pages: Vec<Vec<OverflowNode>>,
    remaining_in_page: usize,
    next_page_nodes: usize,
    num_nodes: usize,
    allocated_bytes: u64,
    mem_tracker: Arc<MemTracker>,
}

impl NodeArena {
    pub fn new(mem_tracker: Arc<MemTracker>) -> Self {
        Self {
            pages: Vec::new(),
            remaining_in_page: 0,
            next_page_nodes: MIN_PAGE_NODES,
            num_nodes: 0,
            allocated_bytes: 0,
            mem_tracker,
        }
    }

    pub fn page_bytes(page_nodes: usize) -> u64 {
        (page_nodes * mem::size_of::<OverflowNode>()) as u64
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn remaining_in_page(&self) -> usize {
        self.remaining_in_page
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    /// Adds a page. Returns false, leaving the arena as it was, when the
    /// memory tracker refuses the charge.
    pub fn grow(&mut self) -> bool {
        let page_nodes = self.next_page_nodes;
        let bytes = Self::page_bytes(page_nodes);
        if !self.mem_tracker.try_consume(bytes) {
            debug!(
                page_nodes,
                bytes,
                remaining = self.mem_tracker.remaining(),
                "overflow node page refused"
            );
            return false;
        }
        self.pages.push(Vec::with_capacity(page_nodes));
        self.remaining_in_page = page_nodes;
        self.next_page_nodes = (page_nodes * 2).min(MAX_PAGE_NODES);
        self.allocated_bytes += bytes;
        true
    }

    /// Makes sure the next `num_nodes` allocations succeed without growing.
    pub fn reserve(&mut self, num_nodes: usize) -> bool {
        debug_assert!(num_nodes <= MIN_PAGE_NODES);
        self.remaining_in_page >= num_nodes || self.grow()
    }

    pub fn alloc(&mut self, node: OverflowNode) -> Option<NodeIndex> {
        if self.remaining_in_page == 0 && !self.grow() {
            return None;
        }
        let page = self.pages.len() - 1;
        let nodes = &mut self.pages[page];
        let slot = nodes.len();
        nodes.push(node);
        self.remaining_in_page -= 1;
        self.num_nodes += 1;
        Some(NodeIndex::new(page as u32, slot as u32))
    }

    pub fn get(&self, idx: NodeIndex) -> &OverflowNode {
        &self.pages[idx.page as usize][idx.slot as usize]
    }

    pub fn get_mut(&mut self, idx: NodeIndex) -> &mut OverflowNode {
        &mut self.pages[idx.page as usize][idx.slot as usize]
    }

    /// Frees every page and returns their bytes to the tracker. Indices
    /// handed out earlier become invalid.
    pub fn release(&mut self) {
        self.pages.clear();
        self.remaining_in_page = 0;
        self.next_page_nodes = MIN_PAGE_NODES;
        self.num_nodes = 0;
        self.mem_tracker.release(self.allocated_bytes);
        self.allocated_bytes = 0;
    }
}

impl Drop for NodeArena {
    fn drop(&mut self) {
        self.release();
    }
}
