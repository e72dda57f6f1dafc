//! Lifecycle controller
//!
//! **Startup order:** stream connection and store client are created by the
//! caller and handed in → pipeline bound to both → ingestion started
//! (non-blocking) → rate tracker started → query surface serving → healthy.
//!
//! **Shutdown order:** unhealthy → leaderboard snapshot captured → query
//! surface stopped within the grace period → pipeline drained (bounded),
//! which releases the stream and store handles → rate tracker stopped →
//! shutdown report emitted.
//!
//! Any failure while stopping a component aborts the sequence with an error
//! so the process exits non-zero.

use crate::ingest::{IngestPipeline, MessageSource};
use crate::query::QueryService;
use crate::rate::RateTracker;
use crate::state::SharedState;
use crate::{build_router, AppState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wrs_common::config::{IngestConfig, ServerConfig, TomlConfig};
use wrs_common::{Error, RankStore, Result, WordScore};

/// Final statistics emitted once the service has shut down
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    /// Leaderboard captured before teardown began
    pub top_ranks: Vec<WordScore>,
    /// Messages read from the stream over the process lifetime
    pub total_events: u64,
    pub events_per_second: f64,
    pub events_per_minute: f64,
    pub generated_at: DateTime<Utc>,
}

impl ShutdownReport {
    pub fn new(top_ranks: Vec<WordScore>, total_events: u64, events_per_second: f64) -> Self {
        Self {
            top_ranks,
            total_events,
            events_per_second,
            events_per_minute: events_per_second * 60.0,
            generated_at: Utc::now(),
        }
    }

    /// Write the report to the log
    pub fn emit(&self) {
        match serde_json::to_string_pretty(&self.top_ranks) {
            Ok(json) => info!("Top ranks at shutdown:\n{}", json),
            Err(e) => warn!("Could not render top ranks: {}", e),
        }
        info!("Total event count: {}", self.total_events);
        info!("Average events per minute: {:.1}", self.events_per_minute);
    }
}

/// Owns every long-running component of the service
pub struct Lifecycle {
    server_config: ServerConfig,
    ingest_config: IngestConfig,
    shared: Arc<SharedState>,
    query: QueryService,
    pipeline: Arc<IngestPipeline>,
    rate: Arc<RateTracker>,
    rate_cancel: CancellationToken,
    rate_task: Option<JoinHandle<()>>,
    server_shutdown: CancellationToken,
    server_task: Option<JoinHandle<std::io::Result<()>>>,
}

impl Lifecycle {
    /// Wire the pipeline, rate tracker and query service to an already-open
    /// stream and store client
    pub fn new(
        config: &TomlConfig,
        source: Box<dyn MessageSource>,
        store: Arc<dyn RankStore>,
    ) -> Self {
        let pipeline = Arc::new(IngestPipeline::new(
            source,
            Arc::clone(&store),
            &config.ingest,
        ));
        let rate = Arc::new(RateTracker::new(pipeline.counter(), &config.rate));

        Self {
            server_config: config.server.clone(),
            ingest_config: config.ingest.clone(),
            shared: Arc::new(SharedState::new()),
            query: QueryService::new(store),
            pipeline,
            rate,
            rate_cancel: CancellationToken::new(),
            rate_task: None,
            server_shutdown: CancellationToken::new(),
            server_task: None,
        }
    }

    pub fn shared(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    pub fn pipeline(&self) -> Arc<IngestPipeline> {
        Arc::clone(&self.pipeline)
    }

    pub fn rate(&self) -> Arc<RateTracker> {
        Arc::clone(&self.rate)
    }

    pub fn query(&self) -> QueryService {
        self.query.clone()
    }

    /// Start ingestion, rate sampling and the query surface on `listener`
    pub async fn start(&mut self, listener: TcpListener) -> Result<SocketAddr> {
        let addr = listener.local_addr()?;

        self.pipeline.start().await?;
        self.rate_task = Some(Arc::clone(&self.rate).spawn(self.rate_cancel.clone()));

        let app = build_router(
            AppState::new(Arc::clone(&self.shared), self.query.clone()),
            self.server_config.request_timeout(),
        );
        let shutdown = self.server_shutdown.clone();
        self.server_task = Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        }));

        self.shared.mark_healthy();
        info!("Server is ready to handle requests at {}", addr);
        Ok(addr)
    }

    /// Run the shutdown sequence and produce the final report
    pub async fn shutdown(&mut self) -> Result<ShutdownReport> {
        info!("Server is shutting down...");
        self.shared.mark_unhealthy();

        let top_ranks = match self.query.top_ranks().await {
            Ok(words) => words,
            Err(e) => {
                warn!("Could not capture leaderboard snapshot: {}", e);
                Vec::new()
            }
        };

        self.stop_server().await?;

        if let Err(e) = self.pipeline.stop(self.ingest_config.drain_timeout()).await {
            error!("Could not gracefully shutdown the pipeline: {}", e);
            return Err(e);
        }

        self.rate_cancel.cancel();
        if let Some(task) = self.rate_task.take() {
            if let Err(e) = task.await {
                warn!("Rate tracker task failed: {}", e);
            }
        }

        let report = ShutdownReport::new(
            top_ranks,
            self.pipeline.counter().get(),
            self.rate.current(),
        );
        report.emit();
        Ok(report)
    }

    async fn stop_server(&mut self) -> Result<()> {
        self.server_shutdown.cancel();
        let Some(mut server) = self.server_task.take() else {
            return Ok(());
        };

        let grace = self.server_config.shutdown_grace();
        match tokio::time::timeout(grace, &mut server).await {
            Ok(Ok(Ok(()))) => {
                info!("HTTP server stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => {
                error!("Could not gracefully shutdown the server: {}", e);
                Err(Error::Io(e))
            }
            Ok(Err(e)) => {
                error!("HTTP server task failed: {}", e);
                Err(Error::Internal(format!("server task: {}", e)))
            }
            Err(_) => {
                server.abort();
                error!("In-flight requests still open after {:?}", grace);
                Err(Error::ShutdownTimeout(format!(
                    "query surface did not stop within {:?}",
                    grace
                )))
            }
        }
    }

    /// Start, wait for `signal`, then shut down
    pub async fn run<F>(mut self, listener: TcpListener, signal: F) -> Result<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        self.start(listener).await?;
        signal.await;
        self.shutdown().await
    }
}
