//! Ingestion rate tracker
//!
//! Samples the ingestion counter once per period and publishes a smoothed
//! rate in events per second. Two strategies are available:
//!
//! - `TickNormalized`: the latest per-period delta divided by the number of
//!   ticks taken so far. Under constant throughput this trends toward zero
//!   on a long-running process; kept for parity with older deployments.
//! - `Windowed` (default): mean of the most recent `window` per-period
//!   deltas.
//!
//! The current rate is readable at any time without locking.

use crate::ingest::IngestCounter;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wrs_common::config::{RateConfig, RateStrategy};

/// Sampling state, touched only by `tick()`
#[derive(Debug)]
struct Sampler {
    last_sample_value: u64,
    tick_index: u64,
    deltas: VecDeque<u64>,
}

/// Periodic sampler over an [`IngestCounter`]
#[derive(Debug)]
pub struct RateTracker {
    counter: Arc<IngestCounter>,
    period: Duration,
    strategy: RateStrategy,
    window: usize,
    sampler: Mutex<Sampler>,
    /// f64 bits of the last computed rate (events per second)
    current_rate: AtomicU64,
}

impl RateTracker {
    pub fn new(counter: Arc<IngestCounter>, config: &RateConfig) -> Self {
        let window = config.window.max(1);
        Self {
            counter,
            period: config.period().max(Duration::from_millis(1)),
            strategy: config.strategy,
            window,
            sampler: Mutex::new(Sampler {
                last_sample_value: 0,
                tick_index: 0,
                deltas: VecDeque::with_capacity(window),
            }),
            current_rate: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Last computed rate in events per second
    pub fn current(&self) -> f64 {
        f64::from_bits(self.current_rate.load(Ordering::Relaxed))
    }

    /// Last computed rate in events per minute
    pub fn current_per_minute(&self) -> f64 {
        self.current() * 60.0
    }

    /// Number of samples taken since start
    pub fn ticks(&self) -> u64 {
        self.sampler
            .lock()
            .map(|sampler| sampler.tick_index)
            .unwrap_or_default()
    }

    /// Take one sample and publish the new rate
    pub fn tick(&self) -> f64 {
        let mut sampler = match self.sampler.lock() {
            Ok(sampler) => sampler,
            Err(poisoned) => {
                warn!("Rate sampler lock poisoned, continuing with last state");
                poisoned.into_inner()
            }
        };

        let value = self.counter.get();
        let delta = value.saturating_sub(sampler.last_sample_value);
        sampler.tick_index += 1;
        sampler.last_sample_value = value;

        let per_period = match self.strategy {
            RateStrategy::TickNormalized => delta as f64 / sampler.tick_index as f64,
            RateStrategy::Windowed => {
                if sampler.deltas.len() == self.window {
                    sampler.deltas.pop_front();
                }
                sampler.deltas.push_back(delta);
                sampler.deltas.iter().sum::<u64>() as f64 / sampler.deltas.len() as f64
            }
        };

        let rate = per_period / self.period.as_secs_f64();
        self.current_rate.store(rate.to_bits(), Ordering::Relaxed);
        rate
    }

    /// Run `tick()` every period until `cancel` fires
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "Rate tracker started (period={:?}, strategy={:?})",
                self.period, self.strategy
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let rate = self.tick();
                        debug!("{:.1} events/min", rate * 60.0);
                    }
                }
            }

            debug!("Rate tracker stopped after {} ticks", self.ticks());
        })
    }
}
