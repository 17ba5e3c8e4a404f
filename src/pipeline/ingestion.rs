//! Pipeline ingestion - channel consumer for raw order payloads
//!
//! Main loop:
//! 1. Receives raw payloads from the source pump via mpsc channel
//! 2. Decodes each payload into orders (malformed payloads are logged and skipped)
//! 3. Runs every order through the admission filter
//! 4. Offers admitted orders to the best-price cache
//!
//! No I/O happens here besides receiving from the channel. Flushing lives in
//! the scheduler, so a slow sink never stalls ingestion.

use super::cache::{BestPriceCache, OfferOutcome};
use super::filter::{AdmissionFilter, Rejection};
use super::types::decode_payload;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

const THROUGHPUT_LOG_SECS: u64 = 10;

/// Counters for one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub messages: u64,
    pub malformed: u64,
    pub orders: u64,
    pub rejected_not_offer: u64,
    pub rejected_location: u64,
    pub rejected_expired: u64,
    pub inserted: u64,
    pub replaced: u64,
    pub kept: u64,
}

impl IngestionStats {
    pub fn admitted(&self) -> u64 {
        self.inserted + self.replaced + self.kept
    }

    pub fn rejected(&self) -> u64 {
        self.rejected_not_offer + self.rejected_location + self.rejected_expired
    }

    fn record_rejection(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::NotAnOffer => self.rejected_not_offer += 1,
            Rejection::UntrackedLocation => self.rejected_location += 1,
            Rejection::Expired => self.rejected_expired += 1,
        }
    }

    fn record_outcome(&mut self, outcome: OfferOutcome) {
        match outcome {
            OfferOutcome::Inserted => self.inserted += 1,
            OfferOutcome::Replaced { .. } => self.replaced += 1,
            OfferOutcome::Kept => self.kept += 1,
        }
    }
}

/// Decode, filter and cache one payload
pub fn ingest_payload(
    payload: &[u8],
    cache: &BestPriceCache,
    filter: &AdmissionFilter,
    stats: &mut IngestionStats,
) {
    stats.messages += 1;

    let orders = match decode_payload(payload) {
        Ok(orders) => orders,
        Err(e) => {
            stats.malformed += 1;
            log::warn!("⚠️  Skipping malformed payload ({} bytes): {}", payload.len(), e);
            return;
        }
    };

    let now = Utc::now();
    for order in orders {
        stats.orders += 1;
        match filter.admit(&order, now) {
            Ok(()) => stats.record_outcome(cache.offer(order)),
            Err(rejection) => {
                log::debug!(
                    "Rejected {} {} @ {}: {}",
                    order.auction_type.as_str(),
                    order.item_type_id,
                    order.location_id,
                    rejection
                );
                stats.record_rejection(rejection);
            }
        }
    }
}

/// Start pipeline ingestion from the payload channel
///
/// Runs until the channel closes (source released or dropped), then returns
/// the counters for the whole run.
pub async fn start_pipeline_ingestion(
    mut rx: mpsc::Receiver<Vec<u8>>,
    cache: Arc<BestPriceCache>,
    filter: Arc<AdmissionFilter>,
) -> IngestionStats {
    log::info!("🚀 Starting pipeline ingestion");
    log::info!("   └─ Waiting for orders...");

    let mut stats = IngestionStats::default();
    let mut window_messages = 0u64;
    let mut last_log_time = Instant::now();

    while let Some(payload) = rx.recv().await {
        ingest_payload(&payload, &cache, &filter, &mut stats);
        window_messages += 1;

        if last_log_time.elapsed().as_secs() >= THROUGHPUT_LOG_SECS {
            let per_sec = window_messages as f64 / last_log_time.elapsed().as_secs_f64();
            log::info!(
                "📊 Ingestion rate: {:.1} msgs/sec | cached keys: {} | admitted: {} rejected: {} malformed: {}",
                per_sec,
                cache.len(),
                stats.admitted(),
                stats.rejected(),
                stats.malformed
            );
            last_log_time = Instant::now();
            window_messages = 0;
        }
    }

    log::info!("✅ Pipeline ingestion stopped ({} messages)", stats.messages);
    stats
}
