//! In-process rank store backend
//!
//! Keeps a score map for O(1) lookups next to an ordered set of
//! `(score, key)` pairs. Both live behind one `RwLock`, so every read sees a
//! single consistent snapshot and every increment is an atomic
//! read-modify-write. No I/O happens under the lock.
//!
//! `BTreeSet` has no order statistics, so finding a rank or a rank range
//! walks the set. Walks start from whichever end is nearer, which keeps
//! `standing` on popular words cheap, but a lookup in the middle of a very
//! large store holds the read lock for O(size) and stalls writers for that
//! long.

use super::{window_bounds, RankStore, WordScore};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Score map plus ascending `(score, key)` index
#[derive(Debug, Default)]
struct Ranking {
    scores: HashMap<String, u64>,
    order: BTreeSet<(u64, String)>,
}

impl Ranking {
    fn increment(&mut self, key: &str, amount: u64) -> u64 {
        match self.scores.get_mut(key) {
            Some(score) => {
                self.order.remove(&(*score, key.to_string()));
                *score = score.saturating_add(amount);
                self.order.insert((*score, key.to_string()));
                *score
            }
            None => {
                self.scores.insert(key.to_string(), amount);
                self.order.insert((amount, key.to_string()));
                amount
            }
        }
    }

    /// Position in ascending order, counted from the nearer end of the set
    fn rank(&self, key: &str) -> Option<usize> {
        let score = *self.scores.get(key)?;
        let pivot = (score, key.to_string());
        let mut below = self
            .order
            .range((Bound::Unbounded, Bound::Excluded(&pivot)));
        let mut above = self
            .order
            .range((Bound::Excluded(&pivot), Bound::Unbounded));

        let mut steps = 0;
        loop {
            if below.next_back().is_none() {
                return Some(steps);
            }
            if above.next().is_none() {
                return Some(self.order.len() - 1 - steps);
            }
            steps += 1;
        }
    }

    /// Walk score groups from the highest down, listing each group in
    /// ascending key order.
    fn top_k(&self, k: usize) -> Vec<WordScore> {
        let mut out = Vec::with_capacity(k.min(self.order.len()));
        let mut next_score = self.order.last().map(|(score, _)| *score);

        while let Some(score) = next_score {
            if out.len() >= k {
                break;
            }
            let group_start = (score, String::new());
            out.extend(
                self.order
                    .range((Bound::Included(&group_start), Bound::Unbounded))
                    .take_while(|(s, _)| *s == score)
                    .take(k - out.len())
                    .map(|(s, key)| WordScore::new(key.clone(), *s)),
            );
            next_score = self
                .order
                .range(..group_start)
                .next_back()
                .map(|(s, _)| *s);
        }

        out
    }

    fn range_by_rank(&self, start: usize, stop: usize) -> Vec<WordScore> {
        let len = self.order.len();
        if start > stop || start >= len {
            return Vec::new();
        }
        let stop = stop.min(len - 1);
        let count = stop - start + 1;
        let entry = |(score, key): &(u64, String)| WordScore::new(key.clone(), *score);

        if start <= len - 1 - stop {
            self.order.iter().skip(start).take(count).map(entry).collect()
        } else {
            let mut out: Vec<WordScore> = self
                .order
                .iter()
                .rev()
                .skip(len - 1 - stop)
                .take(count)
                .map(entry)
                .collect();
            out.reverse();
            out
        }
    }
}

/// Rank store held entirely in process memory
///
/// Lives for the lifetime of the process; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRankStore {
    inner: RwLock<Ranking>,
    closed: AtomicBool,
}

impl MemoryRankStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::StoreUnavailable("rank store is closed".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Ranking>> {
        self.ensure_open()?;
        self.inner
            .read()
            .map_err(|_| Error::StoreUnavailable("rank store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Ranking>> {
        self.ensure_open()?;
        self.inner
            .write()
            .map_err(|_| Error::StoreUnavailable("rank store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RankStore for MemoryRankStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn increment(&self, key: &str, amount: u64) -> Result<u64> {
        Ok(self.write()?.increment(key, amount))
    }

    async fn top_k(&self, k: usize) -> Result<Vec<WordScore>> {
        Ok(self.read()?.top_k(k))
    }

    async fn rank(&self, key: &str) -> Result<usize> {
        self.read()?
            .rank(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn range_by_rank(&self, start: usize, stop: usize) -> Result<Vec<WordScore>> {
        Ok(self.read()?.range_by_rank(start, stop))
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.read()?.scores.len())
    }

    async fn neighbor_window(
        &self,
        key: &str,
        before: usize,
        after: usize,
    ) -> Result<Vec<WordScore>> {
        let ranking = self.read()?;
        let rank = ranking
            .rank(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        let (lower, upper) = window_bounds(rank, before, after, ranking.scores.len());
        Ok(ranking.range_by_rank(lower, upper))
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Memory rank store closed");
        }
        Ok(())
    }
}
