//! Integration tests for the in-process rank store
//!
//! Tests cover:
//! - No lost updates under concurrent increments
//! - Top-K ordering, length and uniqueness on randomized data
//! - Neighbor window bounds against a reference ordering
//! - Default `neighbor_window` composition for backends that do not override it

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use wrs_common::rank::window_bounds;
use wrs_common::{Error, MemoryRankStore, RankStore, Result, WordScore};

/// Reference ascending order: score asc, key asc
fn reference_order(expected: &HashMap<String, u64>) -> Vec<WordScore> {
    let mut entries: Vec<WordScore> = expected
        .iter()
        .map(|(k, v)| WordScore::new(k.clone(), *v))
        .collect();
    entries.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.key.cmp(&b.key)));
    entries
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_are_not_lost() {
    let store = Arc::new(MemoryRankStore::new());
    let words = ["alpha", "beta", "gamma", "delta"];

    let mut handles = Vec::new();
    for worker in 0..16u64 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            for i in 0..250u64 {
                let key = words[((worker + i) % words.len() as u64) as usize];
                store.increment(key, 1 + (i % 3)).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Recompute the expected totals sequentially
    let mut expected: HashMap<&str, u64> = HashMap::new();
    for worker in 0..16u64 {
        for i in 0..250u64 {
            let key = words[((worker + i) % words.len() as u64) as usize];
            *expected.entry(key).or_default() += 1 + (i % 3);
        }
    }

    let all = store.top_k(usize::MAX).await.unwrap();
    assert_eq!(all.len(), words.len());
    for entry in all {
        assert_eq!(entry.score, expected[entry.key.as_str()], "key {}", entry.key);
    }
}

#[tokio::test]
async fn test_top_k_matches_reference_on_random_data() {
    let mut rng = StdRng::seed_from_u64(7);
    let store = MemoryRankStore::new();
    let mut expected: HashMap<String, u64> = HashMap::new();

    for _ in 0..2_000 {
        let key = format!("w{}", rng.gen_range(0..120));
        let amount = rng.gen_range(1..4);
        store.increment(&key, amount).await.unwrap();
        *expected.entry(key).or_default() += amount;
    }

    let mut descending = reference_order(&expected);
    descending.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.key.cmp(&b.key)));

    for k in [0, 1, 10, 119, 120, 500] {
        let top = store.top_k(k).await.unwrap();
        assert_eq!(top.len(), k.min(expected.len()));
        assert_eq!(top, descending[..top.len()].to_vec());
    }
}

#[tokio::test]
async fn test_neighbor_window_matches_reference_on_random_data() {
    let mut rng = StdRng::seed_from_u64(11);
    let store = MemoryRankStore::new();
    let mut expected: HashMap<String, u64> = HashMap::new();

    for _ in 0..600 {
        let key = format!("w{}", rng.gen_range(0..40));
        store.increment(&key, 1).await.unwrap();
        *expected.entry(key).or_default() += 1;
    }

    let ascending = reference_order(&expected);
    for (rank, entry) in ascending.iter().enumerate() {
        assert_eq!(store.rank(&entry.key).await.unwrap(), rank);

        let window = store.neighbor_window(&entry.key, 5, 4).await.unwrap();
        let (lower, upper) = window_bounds(rank, 5, 4, ascending.len());
        assert_eq!(window, ascending[lower..=upper].to_vec());
    }
}

/// Backend relying on the trait's default `neighbor_window`
struct ComposedStore(MemoryRankStore);

#[async_trait]
impl RankStore for ComposedStore {
    fn name(&self) -> &'static str {
        "composed"
    }

    async fn increment(&self, key: &str, amount: u64) -> Result<u64> {
        self.0.increment(key, amount).await
    }

    async fn top_k(&self, k: usize) -> Result<Vec<WordScore>> {
        self.0.top_k(k).await
    }

    async fn rank(&self, key: &str) -> Result<usize> {
        self.0.rank(key).await
    }

    async fn range_by_rank(&self, start: usize, stop: usize) -> Result<Vec<WordScore>> {
        self.0.range_by_rank(start, stop).await
    }

    async fn size(&self) -> Result<usize> {
        self.0.size().await
    }

    async fn close(&self) -> Result<()> {
        self.0.close().await
    }
}

#[tokio::test]
async fn test_default_neighbor_window_clamps_both_ends() {
    let store = ComposedStore(MemoryRankStore::new());
    for (i, key) in ["a", "b", "c", "d", "e", "f", "g", "h"].iter().enumerate() {
        store.increment(key, i as u64 + 1).await.unwrap();
    }

    let window = store.neighbor_window("d", 5, 4).await.unwrap();
    let keys: Vec<&str> = window.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["a", "b", "c", "d", "e", "f", "g", "h"]);

    let err = store.neighbor_window("missing", 5, 4).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
