//! Item id normalization and composite aggregation keys
//!
//! Raw item ids can carry an enchantment marker (`_LEVEL2`) or a tier-variant
//! suffix (`@1`). Both are stripped so every spelling of the same item lands
//! in the same aggregation bucket.

use super::types::{LocationId, MarketOrder};
use std::fmt;

const LEVEL_MARKER: &str = "_LEVEL";

/// Strip enchantment and tier-variant suffixes from a raw item id
///
/// Suffixes are removed repeatedly until none applies, so stacked suffixes
/// (`T4_RUNE_LEVEL1@1`) collapse fully and the function is idempotent.
/// A suffix is never stripped if nothing would remain.
pub fn normalize_item_id(raw: &str) -> String {
    let mut current = raw.trim();

    loop {
        let stripped = strip_variant_suffix(current).or_else(|| strip_level_suffix(current));
        match stripped {
            Some(rest) if !rest.trim().is_empty() => current = rest.trim_end(),
            _ => break,
        }
    }

    current.to_string()
}

/// `"T4_BAG@12"` → `Some("T4_BAG")`
fn strip_variant_suffix(id: &str) -> Option<&str> {
    let (head, digits) = id.rsplit_once('@')?;
    is_ascii_number(digits).then_some(head)
}

/// `"T4_BAG_LEVEL2"` → `Some("T4_BAG")`
fn strip_level_suffix(id: &str) -> Option<&str> {
    let idx = id.rfind(LEVEL_MARKER)?;
    let digits = &id[idx + LEVEL_MARKER.len()..];
    is_ascii_number(digits).then_some(&id[..idx])
}

fn is_ascii_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Tier classifier of a normalized item id
///
/// Ids lead with `T<digit>` (`T4_BAG` → 4). Ids without that classifier
/// (`UNIQUE_HIDEOUT`) have no tier.
pub fn item_tier(normalized_id: &str) -> Option<u8> {
    let mut chars = normalized_id.chars();
    match (chars.next(), chars.next()) {
        (Some('T'), Some(digit)) => digit.to_digit(10).map(|d| d as u8),
        _ => None,
    }
}

/// Aggregation bucket: one best price per item, quality, enchantment and location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    pub item_id: String,
    pub quality: u8,
    pub enchantment: u8,
    pub location: LocationId,
}

impl CompositeKey {
    pub fn new(raw_item_id: &str, quality: u8, enchantment: u8, location: LocationId) -> Self {
        Self {
            item_id: normalize_item_id(raw_item_id),
            quality,
            enchantment,
            location,
        }
    }

    pub fn from_order(order: &MarketOrder) -> Self {
        Self::new(
            &order.item_type_id,
            order.quality_level,
            order.enchantment_level,
            order.location_id.clone(),
        )
    }
}

/// Canonical string form, used as the primary key in the store
impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.item_id, self.quality, self.enchantment, self.location
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_strips_suffixes() {
        assert_eq!(normalize_item_id("T4_BAG"), "T4_BAG");
        assert_eq!(normalize_item_id("T4_BAG_LEVEL2"), "T4_BAG");
        assert_eq!(normalize_item_id("T4_BAG@3"), "T4_BAG");
        assert_eq!(normalize_item_id("T4_RUNE_LEVEL1@1"), "T4_RUNE");
        assert_eq!(normalize_item_id("T8_MAIN_SWORD@10"), "T8_MAIN_SWORD");
    }

    #[test]
    fn test_normalize_leaves_lookalikes() {
        // Marker without digits is part of the id
        assert_eq!(normalize_item_id("T4_LEVEL"), "T4_LEVEL");
        assert_eq!(normalize_item_id("T4_BAG@"), "T4_BAG@");
        assert_eq!(normalize_item_id("T4_BAG@1a"), "T4_BAG@1a");
        // Nothing left after stripping
        assert_eq!(normalize_item_id("@1"), "@1");
        assert_eq!(normalize_item_id("_LEVEL3"), "_LEVEL3");
    }

    #[test]
    fn test_item_tier() {
        assert_eq!(item_tier("T4_BAG"), Some(4));
        assert_eq!(item_tier("T8_2H_BOW"), Some(8));
        assert_eq!(item_tier("UNIQUE_HIDEOUT"), None);
        assert_eq!(item_tier("TX_THING"), None);
        assert_eq!(item_tier(""), None);
    }

    #[test]
    fn test_level_suffix_shares_key() {
        let location = LocationId::from("3005");
        let plain = CompositeKey::new("T4_BAG", 1, 0, location.clone());
        let leveled = CompositeKey::new("T4_BAG_LEVEL2", 1, 0, location.clone());

        assert_eq!(plain, leveled);
        assert_eq!(plain.to_string(), "T4_BAG:1:0:3005");
    }

    #[test]
    fn test_distinct_tuples_distinct_keys() {
        let base = CompositeKey::new("T4_BAG", 1, 0, LocationId::from("3005"));
        assert_ne!(base, CompositeKey::new("T4_BAG", 2, 0, LocationId::from("3005")));
        assert_ne!(base, CompositeKey::new("T4_BAG", 1, 1, LocationId::from("3005")));
        assert_ne!(base, CompositeKey::new("T4_BAG", 1, 0, LocationId::from("7")));
        assert_ne!(base, CompositeKey::new("T5_BAG", 1, 0, LocationId::from("3005")));
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(raw in "[A-Z0-9_@]{0,24}") {
            let once = normalize_item_id(&raw);
            prop_assert_eq!(normalize_item_id(&once), once);
        }

        #[test]
        fn prop_suffix_insensitive(
            base in "T[1-8]_[A-Z]{2,10}",
            level in proptest::option::of(1u8..5),
            variant in proptest::option::of(1u8..5),
        ) {
            let mut raw = base.clone();
            if let Some(level) = level {
                raw.push_str(&format!("_LEVEL{}", level));
            }
            if let Some(variant) = variant {
                raw.push_str(&format!("@{}", variant));
            }
            prop_assert_eq!(normalize_item_id(&raw), base);
        }
    }
}
