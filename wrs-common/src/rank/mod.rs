//! Word ranking: entry type and rank store contract
//!
//! A rank store is an ordered, uniquely-keyed collection mapping a word to
//! its cumulative score. All queries share one total order: ascending score,
//! ties broken by ascending key. The descending view used by [`RankStore::top_k`]
//! reverses the score direction only, so equal scores still list keys in
//! ascending order.
//!
//! The rank of a key is its zero-based position in the ascending order.

mod memory;

pub use memory::MemoryRankStore;

use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One word and its cumulative score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordScore {
    pub score: u64,
    pub key: String,
}

impl WordScore {
    pub fn new(key: impl Into<String>, score: u64) -> Self {
        Self {
            score,
            key: key.into(),
        }
    }
}

/// Clamp a neighbor window around `rank` to the valid rank range of a store
/// holding `size` entries. Returns the inclusive `(lower, upper)` bounds.
pub fn window_bounds(rank: usize, before: usize, after: usize, size: usize) -> (usize, usize) {
    let lower = rank.saturating_sub(before);
    let upper = rank.saturating_add(after).min(size.saturating_sub(1));
    (lower, upper)
}

/// Backend contract for the rank store
///
/// Implementations must be safe under unbounded concurrent callers and must
/// never lose an increment. Reads need snapshot consistency only: an update
/// racing with a read may or may not be visible, but a read never shows a
/// key twice.
///
/// Operations must not block on I/O while holding internal locks. Backends
/// that talk to an external service report connectivity failures as
/// [`Error::StoreUnavailable`].
#[async_trait]
pub trait RankStore: Send + Sync {
    /// Backend name for log output
    fn name(&self) -> &'static str;

    /// Add `amount` to `key`, creating the entry when absent.
    /// Returns the new score.
    async fn increment(&self, key: &str, amount: u64) -> Result<u64>;

    /// The `k` highest entries: descending score, ascending key among ties.
    async fn top_k(&self, k: usize) -> Result<Vec<WordScore>>;

    /// Zero-based ascending rank of `key`; [`Error::NotFound`] when absent.
    async fn rank(&self, key: &str) -> Result<usize>;

    /// Entries with ascending rank in `start..=stop`, clamped to the store.
    async fn range_by_rank(&self, start: usize, stop: usize) -> Result<Vec<WordScore>>;

    /// Number of distinct keys
    async fn size(&self) -> Result<usize>;

    /// Entries covering ranks `rank(key) - before ..= rank(key) + after`,
    /// clamped to the store, in ascending order.
    ///
    /// The default composes `rank`, `size` and `range_by_rank`, which is
    /// what an external sorted-set service offers. Backends that can answer
    /// from a single snapshot should override it.
    async fn neighbor_window(
        &self,
        key: &str,
        before: usize,
        after: usize,
    ) -> Result<Vec<WordScore>> {
        let rank = self.rank(key).await?;
        let size = self.size().await?;
        if size == 0 {
            // Key vanished between the two calls; only possible on backends
            // that can drop entries.
            return Err(Error::NotFound(key.to_string()));
        }
        let (lower, upper) = window_bounds(rank, before, after, size);
        self.range_by_rank(lower, upper).await
    }

    /// Release the backend handle. Idempotent; afterwards every operation
    /// fails with [`Error::StoreUnavailable`].
    async fn close(&self) -> Result<()>;
}
