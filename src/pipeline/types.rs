//! Market order and price record types
//!
//! `MarketOrder` is the decoded form of one inbound order event. Decoding is the
//! only place untyped JSON is touched: everything past `decode_payload` works
//! with validated orders.
//!
//! Wire format (PascalCase, one order per message):
//! ```json
//! {"Id":1,"ItemTypeId":"T4_BAG@1","QualityLevel":2,"EnchantmentLevel":1,
//!  "LocationId":3005,"UnitPriceSilver":12000,"Amount":3,
//!  "AuctionType":"offer","Expires":"2024-05-01T12:00:00.000000"}
//! ```
//! A message may instead carry `{"Orders":[...]}` with several orders.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer};
use std::fmt;

/// Market location identifier
///
/// Upstream publishes location ids as integers or strings depending on the
/// client version; both decode to the same textual id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(String);

impl LocationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for LocationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawLocation {
            Number(i64),
            Text(String),
        }

        match RawLocation::deserialize(deserializer)? {
            RawLocation::Number(n) => Ok(LocationId(n.to_string())),
            RawLocation::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Err(de::Error::custom("empty LocationId"))
                } else {
                    Ok(LocationId(trimmed.to_string()))
                }
            }
        }
    }
}

/// Order book side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuctionType {
    /// Sell order
    Offer,
    /// Buy order
    Request,
    /// Anything else upstream might send
    Unknown,
}

impl AuctionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionType::Offer => "offer",
            AuctionType::Request => "request",
            AuctionType::Unknown => "unknown",
        }
    }
}

impl From<&str> for AuctionType {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "offer" => AuctionType::Offer,
            "request" => AuctionType::Request,
            _ => AuctionType::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for AuctionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(AuctionType::from(raw.as_str()))
    }
}

/// A single decoded market order
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MarketOrder {
    #[serde(default)]
    pub id: Option<u64>,
    pub item_type_id: String,
    pub quality_level: u8,
    pub enchantment_level: u8,
    pub location_id: LocationId,
    pub unit_price_silver: u64,
    #[serde(default)]
    pub amount: Option<u64>,
    pub auction_type: AuctionType,
    #[serde(deserialize_with = "deserialize_expires")]
    pub expires: DateTime<Utc>,
}

/// Errors raised while decoding an inbound payload
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("invalid order: {0}")]
    InvalidOrder(String),
}

/// Decode one inbound message into its orders
///
/// Accepts a bare order object or an `{"Orders": [...]}` envelope. Any
/// malformed order rejects the whole message.
pub fn decode_payload(payload: &[u8]) -> Result<Vec<MarketOrder>, DecodeError> {
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;
    let value: serde_json::Value = serde_json::from_str(text)?;

    let orders = match value.get("Orders") {
        Some(batch) => Vec::<MarketOrder>::deserialize(batch)?,
        None => vec![MarketOrder::deserialize(&value)?],
    };

    for order in &orders {
        validate_order(order)?;
    }

    Ok(orders)
}

fn validate_order(order: &MarketOrder) -> Result<(), DecodeError> {
    if order.item_type_id.trim().is_empty() {
        return Err(DecodeError::InvalidOrder("empty ItemTypeId".to_string()));
    }
    Ok(())
}

/// Parse an `Expires` timestamp
///
/// RFC 3339 is accepted as-is; naive ISO-8601 values (what the game client
/// emits) are interpreted as UTC.
pub fn parse_expires(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_expires<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_expires(&raw).ok_or_else(|| de::Error::custom(format!("invalid Expires timestamp: {}", raw)))
}

/// One row of the best-price table
///
/// Rows are keyed by `composite_key` and overwritten on every flush that
/// contains the key.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub composite_key: String,
    pub item_id: String,
    pub item_name: String,
    pub quality: u8,
    pub enchantment: u8,
    pub price: u64,
    pub location_id: String,
    pub location_name: String,
    pub tier: Option<u8>,
    pub raw_item_id: String,
    pub expires_at: i64,
    pub updated_at: i64,
}
