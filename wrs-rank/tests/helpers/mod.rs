//! Test Helper Utilities
//!
//! Shared utilities for testing wrs-rank

#![allow(dead_code)]

pub mod gated_store;
pub mod log_capture;

pub use gated_store::GatedStore;
pub use log_capture::LogCapture;

use std::future::Future;
use std::time::Duration;

/// JSON envelope carrying `text`
pub fn envelope(text: &str) -> String {
    serde_json::json!({ "message": text }).to_string()
}

/// Poll `check` until it returns true or five seconds pass
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
