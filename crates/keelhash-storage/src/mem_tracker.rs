use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

/// Byte budget shared by every allocation of a join or aggregation operator.
///
/// Requests that would push consumption past the limit are refused rather
/// than aborting; callers turn a refusal into a spill decision.
pub struct MemTracker {
    label: String,
    limit: Option<u64>,
    consumption: AtomicU64,
    peak_consumption: AtomicU64,
    num_rejections: AtomicU64,
}

impl MemTracker {
    pub fn new(label: impl Into<String>, limit: Option<u64>) -> Self {
        Self {
            label: label.into(),
            limit,
            consumption: AtomicU64::new(0),
            peak_consumption: AtomicU64::new(0),
            num_rejections: AtomicU64::new(0),
        }
    }

    pub fn unlimited(label: impl Into<String>) -> Self {
        Self::new(label, None)
    }

    pub fn with_limit(label: impl Into<String>, limit: u64) -> Self {
        Self::new(label, Some(limit))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn try_consume(&self, bytes: u64) -> bool {
        let result = self
            .consumption
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = current.checked_add(bytes)?;
                match self.limit {
                    Some(limit) if next > limit => None,
                    _ => Some(next),
                }
            });
        match result {
            Ok(previous) => {
                self.peak_consumption
                    .fetch_max(previous + bytes, Ordering::Relaxed);
                true
            }
            Err(current) => {
                self.num_rejections.fetch_add(1, Ordering::Relaxed);
                debug!(
                    tracker = %self.label,
                    requested = bytes,
                    consumption = current,
                    limit = ?self.limit,
                    "memory request refused"
                );
                false
            }
        }
    }

    pub fn release(&self, bytes: u64) {
        let _ = self
            .consumption
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                debug_assert!(current >= bytes, "released more than consumed");
                Some(current.saturating_sub(bytes))
            });
    }

    pub fn consumption(&self) -> u64 {
        self.consumption.load(Ordering::Acquire)
    }

    pub fn peak_consumption(&self) -> u64 {
        self.peak_consumption.load(Ordering::Relaxed)
    }

    pub fn num_rejections(&self) -> u64 {
        self.num_rejections.load(Ordering::Relaxed)
    }

    pub fn remaining(&self) -> u64 {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.consumption()),
            None => u64::MAX,
        }
    }

    pub fn limit_exceeded(&self) -> bool {
        matches!(self.limit, Some(limit) if self.consumption() > limit)
    }
}

impl Default for MemTracker {
    fn default() -> Self {
        Self::unlimited("default")
    }
}

impl fmt::Debug for MemTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemTracker")
            .field("label", &self.label)
            .field("limit", &self.limit)
            .field("consumption", &self.consumption())
            .field("peak_consumption", &self.peak_consumption())
            .finish()
    }
}
