//! Shared process state
//!
//! Holds the health flag read by the liveness endpoint. The lifecycle
//! controller writes it once per transition: healthy when the service
//! starts serving, unhealthy when shutdown begins.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct SharedState {
    healthy: AtomicBool,
}

impl SharedState {
    /// New state, initially unhealthy
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn mark_healthy(&self) {
        self.healthy.store(true, Ordering::Release);
    }

    pub fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_transitions() {
        let state = SharedState::new();
        assert!(!state.is_healthy());
        state.mark_healthy();
        assert!(state.is_healthy());
        state.mark_unhealthy();
        assert!(!state.is_healthy());
    }
}
