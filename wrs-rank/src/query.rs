//! Read path over the rank store
//!
//! Both queries are pure reads and need no coordination with ingestion
//! beyond the store's own snapshot consistency.

use std::sync::Arc;
use wrs_common::{RankStore, Result, WordScore};

/// Entries in the leaderboard view
pub const TOP_RANKS: usize = 10;

/// Entries below a word's rank in its standing view
pub const STANDING_BEFORE: usize = 5;

/// Entries above a word's rank in its standing view
pub const STANDING_AFTER: usize = 4;

/// Read-only façade over the rank store
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn RankStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn RankStore>) -> Self {
        Self { store }
    }

    /// Fixed-size leaderboard: highest scores first, ties by ascending key
    pub async fn top_ranks(&self) -> Result<Vec<WordScore>> {
        self.store.top_k(TOP_RANKS).await
    }

    /// Up to ten entries around `id`'s rank, in ascending order
    ///
    /// Fails with `Error::NotFound` when `id` has never been seen.
    pub async fn standing(&self, id: &str) -> Result<Vec<WordScore>> {
        self.store
            .neighbor_window(id, STANDING_BEFORE, STANDING_AFTER)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrs_common::{Error, MemoryRankStore};

    async fn service_with(entries: &[(&str, u64)]) -> QueryService {
        let store = Arc::new(MemoryRankStore::new());
        for (key, score) in entries {
            store.increment(key, *score).await.unwrap();
        }
        QueryService::new(store)
    }

    fn keys(entries: &[WordScore]) -> Vec<&str> {
        entries.iter().map(|e| e.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_top_ranks_fewer_than_ten() {
        let service = service_with(&[("alpha", 10), ("beta", 5), ("gamma", 1)]).await;

        let top = service.top_ranks().await.unwrap();
        assert_eq!(
            top,
            vec![
                WordScore::new("alpha", 10),
                WordScore::new("beta", 5),
                WordScore::new("gamma", 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_top_ranks_capped_at_ten() {
        let entries: Vec<(String, u64)> = (0..25).map(|i| (format!("w{:02}", i), i)).collect();
        let store = Arc::new(MemoryRankStore::new());
        for (key, score) in &entries {
            store.increment(key, *score + 1).await.unwrap();
        }
        let service = QueryService::new(store);

        let top = service.top_ranks().await.unwrap();
        assert_eq!(top.len(), TOP_RANKS);
        assert_eq!(top[0].key, "w24");
        assert_eq!(top[9].key, "w15");
    }

    #[tokio::test]
    async fn test_standing_clamped_at_both_ends() {
        let service = service_with(&[
            ("a", 1),
            ("b", 2),
            ("c", 3),
            ("d", 4),
            ("e", 5),
            ("f", 6),
            ("g", 7),
            ("h", 8),
        ])
        .await;

        let standing = service.standing("d").await.unwrap();
        assert_eq!(keys(&standing), vec!["a", "b", "c", "d", "e", "f", "g", "h"]);
    }

    #[tokio::test]
    async fn test_standing_window_is_five_below_four_above() {
        let entries: Vec<(String, u64)> = (0..20).map(|i| (format!("w{:02}", i), i + 1)).collect();
        let store = Arc::new(MemoryRankStore::new());
        for (key, score) in &entries {
            store.increment(key, *score).await.unwrap();
        }
        let service = QueryService::new(store);

        let standing = service.standing("w10").await.unwrap();
        assert_eq!(standing.len(), 10);
        assert_eq!(standing.first().unwrap().key, "w05");
        assert_eq!(standing.last().unwrap().key, "w14");
    }

    #[tokio::test]
    async fn test_standing_unknown_word() {
        let service = service_with(&[("a", 1)]).await;
        let err = service.standing("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref key) if key == "nope"));
    }
}
