//! Ingestion counter
//!
//! Counts messages read from the stream (not tokens). Written only by the
//! pipeline's reader; the rate tracker and the shutdown report take
//! read-only snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IngestCounter {
    value: AtomicU64,
}

impl IngestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one message; returns the new total
    pub fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current total
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}
