//! Pipeline lifecycle and shutdown coordination
//!
//! ```text
//! Running ──signal──▶ Draining ──▶ Closed
//!    ▲                               ▲
//!  launch              startup failure (abort_startup)
//! ```
//!
//! Draining order:
//! 1. Cancel the scheduler and wait for it (an in-flight flush finishes)
//! 2. Flush the residual window synchronously
//! 3. Release the subscription and let in-flight deliveries reach the cache
//! 4. Flush anything that arrived during the drain
//! 5. Close the sink
//!
//! Every step is best-effort: failures are logged and shutdown carries on.

use super::cache::BestPriceCache;
use super::db::PriceSink;
use super::filter::AdmissionFilter;
use super::flusher::PriceFlusher;
use super::ingestion::{start_pipeline_ingestion, IngestionStats};
use super::scheduler::{flush_scheduler_task, SchedulerStats};
use super::source::{run_order_source, OrderSource};
use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const EXIT_OK: u8 = 0;
pub const EXIT_STARTUP_FAILED: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Running,
    Draining,
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Draining => write!(f, "draining"),
            LifecycleState::Closed => write!(f, "closed"),
        }
    }
}

/// What happened during shutdown
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Records written by the residual flush
    pub residual_records: usize,
    /// Records written for orders that arrived while the subscription drained
    pub late_records: usize,
    pub ingestion: IngestionStats,
    pub scheduler: SchedulerStats,
    /// State the coordinator ended in
    pub state: LifecycleState,
    pub exit_code: u8,
}

/// Owns the running pipeline tasks and tears them down in order
pub struct ShutdownCoordinator {
    state: LifecycleState,
    cache: Arc<BestPriceCache>,
    flusher: PriceFlusher,
    scheduler_cancel: CancellationToken,
    scheduler: JoinHandle<SchedulerStats>,
    source_stop: CancellationToken,
    source: JoinHandle<u64>,
    ingestion: JoinHandle<IngestionStats>,
}

impl ShutdownCoordinator {
    /// Spawn the source pump, ingestion loop and flush scheduler
    pub fn launch(
        source: Box<dyn OrderSource>,
        filter: Arc<AdmissionFilter>,
        cache: Arc<BestPriceCache>,
        flusher: PriceFlusher,
        flush_interval: Duration,
        channel_buffer: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(channel_buffer);

        let source_stop = CancellationToken::new();
        let source = tokio::spawn(run_order_source(source, tx, source_stop.clone()));

        let ingestion = tokio::spawn(start_pipeline_ingestion(rx, cache.clone(), filter));

        let scheduler_cancel = CancellationToken::new();
        let scheduler = tokio::spawn(flush_scheduler_task(
            cache.clone(),
            flusher.clone(),
            flush_interval,
            scheduler_cancel.clone(),
        ));

        log::info!("🟢 Pipeline {}", LifecycleState::Running);

        Self {
            state: LifecycleState::Running,
            cache,
            flusher,
            scheduler_cancel,
            scheduler,
            source_stop,
            source,
            ingestion,
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        log::info!("🔁 Pipeline {} → {}", self.state, next);
        self.state = next;
    }

    /// Flush whatever the cache holds right now, logging failures
    async fn flush_pending(&self, phase: &str) -> usize {
        if self.cache.is_empty() {
            return 0;
        }

        let batch = self.cache.snapshot_and_clear();
        let pending = batch.len();
        log::info!("🔄 {} flush: {} pending records", phase, pending);

        match self.flusher.flush(batch).await {
            Ok(report) => {
                log::info!("✅ {} flush wrote {} records", phase, report.records);
                report.records
            }
            Err(e) => {
                log::error!("❌ {} flush failed ({} records lost): {}", phase, pending, e);
                0
            }
        }
    }

    /// Drain and close the pipeline
    pub async fn shutdown(mut self) -> ShutdownReport {
        self.transition(LifecycleState::Draining);
        let mut report = ShutdownReport::default();

        self.scheduler_cancel.cancel();
        match (&mut self.scheduler).await {
            Ok(stats) => report.scheduler = stats,
            Err(e) => log::error!("❌ Flush scheduler task failed: {}", e),
        }

        report.residual_records = self.flush_pending("Residual").await;

        self.source_stop.cancel();
        if let Err(e) = (&mut self.source).await {
            log::error!("❌ Order source task failed: {}", e);
        }
        match (&mut self.ingestion).await {
            Ok(stats) => report.ingestion = stats,
            Err(e) => log::error!("❌ Ingestion task failed: {}", e),
        }

        report.late_records = self.flush_pending("Late").await;

        let sink = self.flusher.sink().clone();
        match sink.close().await {
            Ok(()) => log::info!("🔒 {} sink closed", sink.backend_type()),
            Err(e) => log::error!("❌ Failed to close {} sink: {}", sink.backend_type(), e),
        }

        self.transition(LifecycleState::Closed);
        log_ingestion_summary(&report.ingestion);

        report.state = self.state;
        report.exit_code = EXIT_OK;
        report
    }

    /// Run until `termination` resolves, then shut down
    ///
    /// If the termination listener itself fails the pipeline is still drained
    /// and closed, but the exit code reports the failure.
    pub async fn run_until<F>(self, termination: F) -> ShutdownReport
    where
        F: Future<Output = io::Result<()>>,
    {
        let listener = termination.await;
        if let Err(e) = &listener {
            log::error!("❌ Failed to listen for termination signals: {}", e);
        }

        let mut report = self.shutdown().await;
        if listener.is_err() {
            report.exit_code = EXIT_STARTUP_FAILED;
        }
        report
    }
}

fn log_ingestion_summary(stats: &IngestionStats) {
    log::info!("📊 Ingestion summary:");
    log::info!("   ├─ Messages: {} ({} malformed)", stats.messages, stats.malformed);
    log::info!(
        "   ├─ Orders admitted: {} (inserted {}, replaced {}, kept {})",
        stats.admitted(),
        stats.inserted,
        stats.replaced,
        stats.kept
    );
    log::info!(
        "   └─ Orders rejected: {} (side {}, location {}, expired {})",
        stats.rejected(),
        stats.rejected_not_offer,
        stats.rejected_location,
        stats.rejected_expired
    );
}

/// Initialization failed before the pipeline reached Running
///
/// Closes whatever was already acquired and returns the failure exit code.
pub async fn abort_startup(sink: Option<Arc<dyn PriceSink>>) -> u8 {
    if let Some(sink) = sink {
        if let Err(e) = sink.close().await {
            log::error!("❌ Failed to close {} sink during startup abort: {}", sink.backend_type(), e);
        }
    }
    log::info!("🔁 Pipeline → {} (startup failed)", LifecycleState::Closed);
    EXIT_STARTUP_FAILED
}

/// Resolve on SIGINT or SIGTERM
///
/// Falls back to CTRL+C if the unix handlers cannot be installed.
#[cfg(unix)]
pub async fn wait_for_termination() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let handlers = signal(SignalKind::interrupt())
        .and_then(|sigint| Ok((sigint, signal(SignalKind::terminate())?)));

    match handlers {
        Ok((mut sigint, mut sigterm)) => {
            tokio::select! {
                _ = sigint.recv() => log::info!("⚠️  Received SIGINT"),
                _ = sigterm.recv() => log::info!("⚠️  Received SIGTERM"),
            }
            Ok(())
        }
        Err(e) => {
            log::warn!("⚠️  Signal handlers unavailable ({}), falling back to CTRL+C", e);
            wait_for_ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
pub async fn wait_for_termination() -> io::Result<()> {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    log::info!("⚠️  Received CTRL+C");
    Ok(())
}
