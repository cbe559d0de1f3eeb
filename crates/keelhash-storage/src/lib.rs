mod mem_tracker;
mod record;
mod row_store;

pub use mem_tracker::MemTracker;
pub use record::Record;
pub use row_store::{DEFAULT_ROWS_PER_PAGE, PagedRowStore, RowIdx, RowStore};
