//! Chunk scheduler - periodic flush of the best-price window
//!
//! Each tick swaps the cache out and hands the batch to the flusher. The next
//! tick is armed only after the current one (flush and error handling
//! included) completes, so ticks never overlap. A failed flush is logged and
//! the loop carries on.

use super::cache::BestPriceCache;
use super::flusher::PriceFlusher;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Counters for one scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
    pub records_written: u64,
}

/// Flush scheduler task
///
/// Runs until `cancel` fires. A flush already in flight when cancellation
/// arrives finishes; no new tick starts afterwards.
pub async fn flush_scheduler_task(
    cache: Arc<BestPriceCache>,
    flusher: PriceFlusher,
    flush_interval: Duration,
    cancel: CancellationToken,
) -> SchedulerStats {
    log::info!("⏰ Starting flush scheduler (interval: {}ms)", flush_interval.as_millis());

    let mut stats = SchedulerStats::default();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep(flush_interval) => {}
        }

        stats.ticks += 1;

        if cache.is_empty() {
            continue;
        }

        let batch = cache.snapshot_and_clear();
        let batch_len = batch.len();

        match flusher.flush(batch).await {
            Ok(report) => {
                stats.flushes += 1;
                stats.records_written += report.records as u64;
                log::info!(
                    "📊 Flush complete: {} records | {}ms",
                    report.records,
                    report.duration.as_millis()
                );
            }
            Err(e) => {
                stats.failed_flushes += 1;
                log::error!("❌ Failed to flush {} records (window dropped): {}", batch_len, e);
            }
        }
    }

    log::info!(
        "⏹️  Flush scheduler stopped ({} ticks, {} flushes, {} failed)",
        stats.ticks,
        stats.flushes,
        stats.failed_flushes
    );
    stats
}
