//! Rank store whose increments and close can be held back

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use wrs_common::{Error, MemoryRankStore, RankStore, Result, WordScore};

const OPEN: usize = Semaphore::MAX_PERMITS / 4;

/// In-memory store that parks `increment` and/or `close` until opened
pub struct GatedStore {
    inner: MemoryRankStore,
    increments: Semaphore,
    closes: Semaphore,
    close_started: AtomicBool,
}

impl GatedStore {
    fn with_gates(increments: usize, closes: usize) -> Self {
        Self {
            inner: MemoryRankStore::new(),
            increments: Semaphore::new(increments),
            closes: Semaphore::new(closes),
            close_started: AtomicBool::new(false),
        }
    }

    /// Every increment waits for `open()`
    pub fn blocking_increments() -> Self {
        Self::with_gates(0, OPEN)
    }

    /// `close()` waits for `open()`
    pub fn blocking_close() -> Self {
        Self::with_gates(OPEN, 0)
    }

    /// Release everything held back
    pub fn open(&self) {
        if self.increments.available_permits() == 0 {
            self.increments.add_permits(OPEN);
        }
        if self.closes.available_permits() == 0 {
            self.closes.add_permits(OPEN);
        }
    }

    /// True once `close()` has been entered
    pub fn close_started(&self) -> bool {
        self.close_started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RankStore for GatedStore {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn increment(&self, key: &str, amount: u64) -> Result<u64> {
        let _pass = self
            .increments
            .acquire()
            .await
            .map_err(|_| Error::StoreUnavailable("gate closed".to_string()))?;
        self.inner.increment(key, amount).await
    }

    async fn top_k(&self, k: usize) -> Result<Vec<WordScore>> {
        self.inner.top_k(k).await
    }

    async fn rank(&self, key: &str) -> Result<usize> {
        self.inner.rank(key).await
    }

    async fn range_by_rank(&self, start: usize, stop: usize) -> Result<Vec<WordScore>> {
        self.inner.range_by_rank(start, stop).await
    }

    async fn size(&self) -> Result<usize> {
        self.inner.size().await
    }

    async fn close(&self) -> Result<()> {
        self.close_started.store(true, Ordering::SeqCst);
        let _pass = self
            .closes
            .acquire()
            .await
            .map_err(|_| Error::StoreUnavailable("gate closed".to_string()))?;
        self.inner.close().await
    }
}
