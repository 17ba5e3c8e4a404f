//! Persistence flusher - turns a flush batch into upserts
//!
//! Each cached order becomes one `PriceRecord` keyed by its composite key.
//! Names come from the item catalog and location table with explicit
//! fallbacks. Failed batches are reported to the caller and dropped; the next
//! window re-aggregates current market state.

use super::cache::FlushBatch;
use super::catalog::ItemCatalog;
use super::db::{PriceSink, SinkError};
use super::locations::LocationTable;
use super::normalizer::{item_tier, CompositeKey};
use super::types::{MarketOrder, PriceRecord};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one successful flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    pub records: usize,
    pub duration: Duration,
}

#[derive(Clone)]
pub struct PriceFlusher {
    catalog: Arc<ItemCatalog>,
    locations: Arc<LocationTable>,
    sink: Arc<dyn PriceSink>,
}

impl PriceFlusher {
    pub fn new(catalog: Arc<ItemCatalog>, locations: Arc<LocationTable>, sink: Arc<dyn PriceSink>) -> Self {
        Self {
            catalog,
            locations,
            sink,
        }
    }

    pub fn sink(&self) -> &Arc<dyn PriceSink> {
        &self.sink
    }

    /// Build the upsert rows for a batch, stamped with `now`
    pub fn build_records(&self, batch: FlushBatch, now: DateTime<Utc>) -> Vec<PriceRecord> {
        batch
            .into_iter()
            .map(|(key, order)| self.build_record(key, order, now))
            .collect()
    }

    fn build_record(&self, key: CompositeKey, order: MarketOrder, now: DateTime<Utc>) -> PriceRecord {
        PriceRecord {
            composite_key: key.to_string(),
            item_name: self.catalog.display_name(&order.item_type_id, &key.item_id),
            tier: item_tier(&key.item_id),
            location_name: self.locations.display_name(&key.location),
            location_id: key.location.as_str().to_string(),
            item_id: key.item_id,
            quality: key.quality,
            enchantment: key.enchantment,
            price: order.unit_price_silver,
            raw_item_id: order.item_type_id,
            expires_at: order.expires.timestamp(),
            updated_at: now.timestamp(),
        }
    }

    /// Persist one window as a single batched upsert
    ///
    /// An empty batch never reaches the sink.
    pub async fn flush(&self, batch: FlushBatch) -> Result<FlushReport, SinkError> {
        if batch.is_empty() {
            return Ok(FlushReport::default());
        }

        let started = Instant::now();
        let records = self.build_records(batch, Utc::now());
        let written = self.sink.upsert_batch(records).await?;

        Ok(FlushReport {
            records: written,
            duration: started.elapsed(),
        })
    }
}
