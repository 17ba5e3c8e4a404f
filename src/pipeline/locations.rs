//! Tracked market locations
//!
//! The location table is both the admission allow-list and the source of
//! human-readable market names written to the store.

use super::types::LocationId;
use std::collections::BTreeMap;

/// Markets tracked when `TRACKED_LOCATIONS` is not set
pub const DEFAULT_MARKETS: &[(&str, &str)] = &[
    ("7", "Thetford"),
    ("1002", "Lymhurst"),
    ("2004", "Bridgewatch"),
    ("3003", "Black Market"),
    ("3005", "Caerleon"),
    ("3008", "Martlock"),
    ("4002", "Fort Sterling"),
    ("5003", "Brecilien"),
];

/// Read-only mapping of tracked location id → display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationTable {
    names: BTreeMap<LocationId, String>,
}

impl LocationTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            names: entries
                .into_iter()
                .map(|(id, name)| (LocationId::new(id), name.into()))
                .collect(),
        }
    }

    pub fn default_markets() -> Self {
        Self::new(DEFAULT_MARKETS.iter().copied())
    }

    pub fn is_tracked(&self, id: &LocationId) -> bool {
        self.names.contains_key(id)
    }

    /// Display name, or `"Unknown (<id>)"` for ids outside the table
    pub fn display_name(&self, id: &LocationId) -> String {
        self.names
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("Unknown ({})", id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LocationId, &str)> {
        self.names.iter().map(|(id, name)| (id, name.as_str()))
    }
}

impl Default for LocationTable {
    fn default() -> Self {
        Self::default_markets()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_markets() {
        let table = LocationTable::default();
        assert_eq!(table.len(), DEFAULT_MARKETS.len());
        assert!(table.is_tracked(&LocationId::from("3005")));
        assert_eq!(table.display_name(&LocationId::from("3005")), "Caerleon");
    }

    #[test]
    fn test_unknown_location_fallback() {
        let table = LocationTable::new([("7", "Thetford")]);
        let unknown = LocationId::from("9999");

        assert!(!table.is_tracked(&unknown));
        assert_eq!(table.display_name(&unknown), "Unknown (9999)");
    }
}
