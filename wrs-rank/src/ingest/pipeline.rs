//! Ingestion pipeline
//!
//! One reader task pulls envelopes from the stream source, counts them and
//! hands each one to a tokenize-and-increment task. Hand-offs overlap with
//! reading, but at most `max_in_flight` of them run at once: the reader
//! must obtain a permit before it reads the next message, so a slow store
//! throttles intake instead of growing an unbounded backlog.
//!
//! **State machine:** `Idle → Running → Draining → Stopped`
//!
//! - `start()` moves `Idle → Running` and spawns the reader.
//! - A read error or end of stream ends the read loop; the reader closes the
//!   source, waits for its hand-offs and moves to `Stopped` on its own.
//! - `stop()` moves `Running → Draining`, stops the reader, waits for
//!   in-flight hand-offs up to the drain timeout (aborting the rest when it
//!   elapses, even mid-increment), releases the store handle and moves to
//!   `Stopped`.
//!
//! The pipeline exclusively owns the source handle and the store client
//! handle; each is released exactly once.

use super::counter::IngestCounter;
use super::envelope::message_text;
use super::source::MessageSource;
use super::tokenizer::tokenize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use wrs_common::config::IngestConfig;
use wrs_common::{Error, RankStore, Result};

/// How long aborted hand-offs get to notice the abort before `stop()` gives up
const ABORT_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle state of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Why the read loop ended
#[derive(Debug)]
enum LoopExit {
    Stopped,
    EndOfStream,
    ReadFailed(Error),
}

/// Streaming consumer feeding the rank store
pub struct IngestPipeline {
    store: Arc<dyn RankStore>,
    counter: Arc<IngestCounter>,
    max_in_flight: usize,
    permits: Arc<Semaphore>,
    state: watch::Sender<PipelineState>,
    source: Mutex<Option<Box<dyn MessageSource>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    handoffs: TaskTracker,
    stop_reading: CancellationToken,
    abort_handoffs: CancellationToken,
    stop_called: AtomicBool,
    /// Set once the first `stop()` has released every handle
    stop_done: watch::Sender<bool>,
}

impl IngestPipeline {
    /// Create an idle pipeline bound to `source` and `store`
    pub fn new(
        source: Box<dyn MessageSource>,
        store: Arc<dyn RankStore>,
        config: &IngestConfig,
    ) -> Self {
        let max_in_flight = config.max_in_flight.max(1);
        let (state, _) = watch::channel(PipelineState::Idle);
        let (stop_done, _) = watch::channel(false);

        Self {
            store,
            counter: Arc::new(IngestCounter::new()),
            max_in_flight,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            state,
            source: Mutex::new(Some(source)),
            reader: Mutex::new(None),
            handoffs: TaskTracker::new(),
            stop_reading: CancellationToken::new(),
            abort_handoffs: CancellationToken::new(),
            stop_called: AtomicBool::new(false),
            stop_done,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Shared handle to the message counter
    pub fn counter(&self) -> Arc<IngestCounter> {
        Arc::clone(&self.counter)
    }

    /// Number of tokenize-and-increment hand-offs still running
    ///
    /// The reader's reserved permit for its next read is not counted.
    pub fn in_flight(&self) -> usize {
        self.handoffs.len()
    }

    /// Resolve once the pipeline reaches `Stopped`
    pub async fn wait_stopped(&self) {
        let mut rx = self.state.subscribe();
        // Sender lives as long as self, so the wait cannot fail
        let _ = rx.wait_for(|s| *s == PipelineState::Stopped).await;
    }

    /// Begin ingesting. Returns immediately; reading happens on a spawned task.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let current = self.state();
        if current != PipelineState::Idle {
            return Err(Error::Internal(format!(
                "cannot start pipeline in state {:?}",
                current
            )));
        }

        let source = self
            .source
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Internal("pipeline source already taken".to_string()))?;

        self.state.send_replace(PipelineState::Running);
        info!(
            "Ingestion pipeline started (max_in_flight={})",
            self.max_in_flight
        );

        let pipeline = Arc::clone(self);
        let handle = tokio::spawn(async move {
            pipeline.read_loop(source).await;
        });
        *self.reader.lock().await = Some(handle);

        Ok(())
    }

    async fn read_loop(&self, mut source: Box<dyn MessageSource>) {
        let exit = loop {
            // Permit first: backpressure applies before the next read
            let permit = tokio::select! {
                biased;
                _ = self.stop_reading.cancelled() => break LoopExit::Stopped,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break LoopExit::Stopped,
                },
            };

            let next = tokio::select! {
                biased;
                _ = self.stop_reading.cancelled() => break LoopExit::Stopped,
                next = source.next_message() => next,
            };

            match next {
                Ok(Some(raw)) => {
                    let total = self.counter.increment();
                    if total % 10_000 == 0 {
                        debug!("Ingested {} messages", total);
                    }

                    let store = Arc::clone(&self.store);
                    let abort = self.abort_handoffs.clone();
                    self.handoffs.spawn(async move {
                        let _permit = permit;
                        apply_message(store.as_ref(), &raw, &abort).await;
                    });
                }
                Ok(None) => break LoopExit::EndOfStream,
                Err(e) => break LoopExit::ReadFailed(e),
            }
        };

        if let Err(e) = source.close().await {
            error!("Failed to close stream source: {}", e);
        }

        match &exit {
            LoopExit::Stopped => {
                debug!("Read loop stopped on request");
                return;
            }
            LoopExit::EndOfStream => info!("Stream ended by peer"),
            LoopExit::ReadFailed(e) => error!("read: {}", e),
        }

        self.state.send_if_modified(|s| {
            if *s == PipelineState::Running {
                *s = PipelineState::Draining;
                true
            } else {
                false
            }
        });

        // stop() may already be draining; in that case it owns the final
        // transition and its own timeout.
        if self.stop_called.load(Ordering::Acquire) {
            return;
        }

        self.handoffs.close();
        self.handoffs.wait().await;
        self.state.send_if_modified(|s| {
            if *s == PipelineState::Draining {
                *s = PipelineState::Stopped;
                true
            } else {
                false
            }
        });
        info!(
            "Ingestion pipeline stopped after {} messages",
            self.counter.get()
        );
    }

    /// Stop intake, drain in-flight hand-offs and release handles
    ///
    /// Idempotent: a second call waits until the first has released every
    /// handle and returns `Ok(())`. When the drain exceeds `drain_timeout`,
    /// remaining hand-offs are aborted and [`Error::ShutdownTimeout`] is
    /// returned.
    pub async fn stop(&self, drain_timeout: Duration) -> Result<()> {
        if self.stop_called.swap(true, Ordering::AcqRel) {
            debug!("stop() already in progress or complete");
            let mut done = self.stop_done.subscribe();
            // Sender lives as long as self, so the wait cannot fail
            let _ = done.wait_for(|done| *done).await;
            return Ok(());
        }

        let mut was_idle = false;
        self.state.send_modify(|s| match *s {
            PipelineState::Idle => was_idle = true,
            PipelineState::Running => *s = PipelineState::Draining,
            PipelineState::Draining | PipelineState::Stopped => {}
        });
        self.stop_reading.cancel();

        let mut result = Ok(());

        if was_idle {
            if let Some(mut source) = self.source.lock().await.take() {
                if let Err(e) = source.close().await {
                    error!("closing source: {}", e);
                    result = Err(e);
                }
            }
        } else {
            let reader = self.reader.lock().await.take();
            let drain = async {
                if let Some(handle) = reader {
                    if let Err(e) = handle.await {
                        error!("Reader task failed: {}", e);
                    }
                }
                self.handoffs.close();
                self.handoffs.wait().await;
            };

            if tokio::time::timeout(drain_timeout, drain).await.is_err() {
                warn!(
                    "Drain exceeded {:?} with {} hand-offs in flight, aborting them",
                    drain_timeout,
                    self.in_flight()
                );
                self.abort_handoffs.cancel();
                self.handoffs.close();
                if tokio::time::timeout(ABORT_GRACE, self.handoffs.wait())
                    .await
                    .is_err()
                {
                    error!("Aborted hand-offs still running after {:?}", ABORT_GRACE);
                }
                result = Err(Error::ShutdownTimeout(format!(
                    "in-flight ingestion did not drain within {:?}",
                    drain_timeout
                )));
            }
        }

        if let Err(e) = self.store.close().await {
            error!("closing {} store: {}", self.store.name(), e);
            if result.is_ok() {
                result = Err(e);
            }
        }

        self.state.send_replace(PipelineState::Stopped);
        self.stop_done.send_replace(true);
        info!("stop() complete ({} messages ingested)", self.counter.get());

        result
    }
}

/// Tokenize one envelope and apply its increments
///
/// Store failures are logged and the increment dropped; counting is
/// best-effort rather than retried. `abort` interrupts the hand-off even
/// while an increment is pending.
async fn apply_message(store: &dyn RankStore, raw: &[u8], abort: &CancellationToken) {
    let text = message_text(raw);
    for token in tokenize(&text) {
        let result = tokio::select! {
            biased;
            _ = abort.cancelled() => {
                debug!("Hand-off aborted before completion");
                return;
            }
            result = store.increment(&token, 1) => result,
        };
        if let Err(e) = result {
            warn!("increment {:?}: {}", token, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::source::ChannelSource;
    use wrs_common::MemoryRankStore;

    fn config(max_in_flight: usize) -> IngestConfig {
        IngestConfig {
            max_in_flight,
            drain_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_new_pipeline_is_idle() {
        let (_tx, source) = ChannelSource::channel(1);
        let store = Arc::new(MemoryRankStore::new());
        let pipeline = IngestPipeline::new(Box::new(source), store, &config(4));

        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.in_flight(), 0);
        assert_eq!(pipeline.counter().get(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (_tx, source) = ChannelSource::channel(1);
        let store = Arc::new(MemoryRankStore::new());
        let pipeline = Arc::new(IngestPipeline::new(Box::new(source), store, &config(4)));

        pipeline.start().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert!(matches!(pipeline.start().await, Err(Error::Internal(_))));

        pipeline.stop(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_from_idle_releases_handles() {
        let (tx, source) = ChannelSource::channel(1);
        let store = Arc::new(MemoryRankStore::new());
        let pipeline = IngestPipeline::new(Box::new(source), store.clone(), &config(4));

        pipeline.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Stopped);

        // Source receiver closed, store closed
        assert!(tx.send(Ok("x".to_string())).await.is_err());
        assert!(store.top_k(1).await.is_err());
    }

    #[tokio::test]
    async fn test_apply_message_counts_tokens() {
        let store = MemoryRankStore::new();
        let abort = CancellationToken::new();
        apply_message(&store, br#"{"message":"a b a"}"#, &abort).await;

        assert_eq!(store.rank("b").await.unwrap(), 0);
        let top = store.top_k(2).await.unwrap();
        assert_eq!(top[0].key, "a");
        assert_eq!(top[0].score, 2);
    }

    #[tokio::test]
    async fn test_apply_message_honours_abort() {
        let store = MemoryRankStore::new();
        let abort = CancellationToken::new();
        abort.cancel();
        apply_message(&store, br#"{"message":"a b c"}"#, &abort).await;

        assert_eq!(store.size().await.unwrap(), 0);
    }
}
