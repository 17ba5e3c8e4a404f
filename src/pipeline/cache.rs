//! Best-price cache for the current flush window
//!
//! Holds the cheapest admitted order per composite key since the last flush.
//! The map lives behind a single mutex; `offer` and `snapshot_and_clear` each
//! take it exactly once, so neither is ever observed half-applied. Nothing
//! awaits while holding the lock.

use super::normalizer::CompositeKey;
use super::types::MarketOrder;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of offering an order to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    /// First order for this key in the window
    Inserted,
    /// Strictly cheaper than the cached order
    Replaced { previous_price: u64 },
    /// Same price or more expensive; cached order kept
    Kept,
}

#[derive(Debug, Default)]
pub struct BestPriceCache {
    entries: Mutex<HashMap<CompositeKey, MarketOrder>>,
}

impl BestPriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CompositeKey, MarketOrder>> {
        // A panic mid-offer cannot leave the map structurally broken
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Keep `order` if it is the cheapest seen for its key this window
    ///
    /// Ties keep the earlier order.
    pub fn offer(&self, order: MarketOrder) -> OfferOutcome {
        let key = CompositeKey::from_order(&order);
        let mut entries = self.lock();

        match entries.get_mut(&key) {
            None => {
                entries.insert(key, order);
                OfferOutcome::Inserted
            }
            Some(current) if order.unit_price_silver < current.unit_price_silver => {
                let previous_price = current.unit_price_silver;
                *current = order;
                OfferOutcome::Replaced { previous_price }
            }
            Some(_) => OfferOutcome::Kept,
        }
    }

    /// Move the whole window out and leave the cache empty
    pub fn snapshot_and_clear(&self) -> FlushBatch {
        let entries = std::mem::take(&mut *self.lock());
        FlushBatch { entries }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Immutable snapshot of one flush window
#[derive(Debug, Default)]
pub struct FlushBatch {
    entries: HashMap<CompositeKey, MarketOrder>,
}

impl FlushBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &CompositeKey) -> Option<&MarketOrder> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, &MarketOrder)> {
        self.entries.iter()
    }
}

impl IntoIterator for FlushBatch {
    type Item = (CompositeKey, MarketOrder);
    type IntoIter = std::collections::hash_map::IntoIter<CompositeKey, MarketOrder>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{AuctionType, LocationId};
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn make_order(item: &str, price: u64, id: u64) -> MarketOrder {
        MarketOrder {
            id: Some(id),
            item_type_id: item.to_string(),
            quality_level: 1,
            enchantment_level: 0,
            location_id: LocationId::from("3005"),
            unit_price_silver: price,
            amount: Some(1),
            auction_type: AuctionType::Offer,
            expires: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn test_keeps_cheapest_price() {
        let cache = BestPriceCache::new();

        assert_eq!(cache.offer(make_order("T4_BAG", 100, 1)), OfferOutcome::Inserted);
        assert_eq!(
            cache.offer(make_order("T4_BAG", 80, 2)),
            OfferOutcome::Replaced { previous_price: 100 }
        );
        assert_eq!(cache.offer(make_order("T4_BAG", 90, 3)), OfferOutcome::Kept);

        let batch = cache.snapshot_and_clear();
        assert_eq!(batch.len(), 1);
        let (_, best) = batch.iter().next().unwrap();
        assert_eq!(best.unit_price_silver, 80);
        assert_eq!(best.id, Some(2));
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let cache = BestPriceCache::new();
        cache.offer(make_order("T4_BAG", 50, 1));
        assert_eq!(cache.offer(make_order("T4_BAG", 50, 2)), OfferOutcome::Kept);

        let batch = cache.snapshot_and_clear();
        assert_eq!(batch.iter().next().unwrap().1.id, Some(1));
    }

    #[test]
    fn test_level_suffix_aggregates_together() {
        let cache = BestPriceCache::new();
        cache.offer(make_order("T4_BAG", 300, 1));
        cache.offer(make_order("T4_BAG_LEVEL2", 200, 2));

        assert_eq!(cache.len(), 1);
        let batch = cache.snapshot_and_clear();
        let (key, best) = batch.iter().next().unwrap();
        assert_eq!(key.item_id, "T4_BAG");
        assert_eq!(best.item_type_id, "T4_BAG_LEVEL2");
    }

    #[test]
    fn test_snapshot_clears_cache() {
        let cache = BestPriceCache::new();
        cache.offer(make_order("T4_BAG", 10, 1));
        cache.offer(make_order("T5_BAG", 20, 2));

        let batch = cache.snapshot_and_clear();
        assert_eq!(batch.len(), 2);
        assert!(cache.is_empty());

        // Next window starts fresh: a pricier order is accepted again
        assert_eq!(cache.offer(make_order("T4_BAG", 99, 3)), OfferOutcome::Inserted);
        assert!(cache.snapshot_and_clear().get(&CompositeKey::from_order(&make_order("T4_BAG", 0, 0))).is_some());
    }

    #[test]
    fn test_snapshot_atomic_under_concurrent_offers() {
        // Every order has a unique key, so each must land in exactly one batch
        const WRITERS: u64 = 4;
        const PER_WRITER: u64 = 2_000;

        let cache = Arc::new(BestPriceCache::new());
        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..PER_WRITER {
                        cache.offer(make_order(&format!("T4_ITEM_{}_{}", w, i), 10, w * PER_WRITER + i));
                    }
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut total = 0usize;
        while writers.iter().any(|h| !h.is_finished()) {
            for (key, _) in cache.snapshot_and_clear() {
                total += 1;
                seen.insert(key);
            }
        }
        for handle in writers {
            handle.join().unwrap();
        }
        for (key, _) in cache.snapshot_and_clear() {
            total += 1;
            seen.insert(key);
        }

        assert_eq!(seen.len() as u64, WRITERS * PER_WRITER);
        assert_eq!(total, seen.len(), "no order may appear in two batches");
    }

    proptest! {
        #[test]
        fn prop_min_price_first_seen(prices in proptest::collection::vec(1u64..1_000, 1..40)) {
            let cache = BestPriceCache::new();
            for (idx, price) in prices.iter().enumerate() {
                cache.offer(make_order("T6_CAPE", *price, idx as u64));
            }

            let min = *prices.iter().min().unwrap();
            let first_min_idx = prices.iter().position(|p| *p == min).unwrap() as u64;

            let batch = cache.snapshot_and_clear();
            prop_assert_eq!(batch.len(), 1);
            let (_, best) = batch.iter().next().unwrap();
            prop_assert_eq!(best.unit_price_silver, min);
            prop_assert_eq!(best.id, Some(first_min_idx));
        }
    }
}
