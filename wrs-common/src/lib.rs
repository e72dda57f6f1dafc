//! # WRS Common Library
//!
//! Shared code for the word-rank services including:
//! - Error taxonomy (`Error` enum)
//! - TOML configuration loading
//! - Word-score entries and the rank store contract
//! - In-process rank store backend

pub mod config;
pub mod error;
pub mod rank;

pub use error::{Error, Result};
pub use rank::{MemoryRankStore, RankStore, WordScore};
