//! Per-order admission filter
//!
//! An order enters the best-price cache only if it is a sell offer, listed on
//! a tracked market and not yet expired. The checks are independent; the first
//! failing one is reported.

use super::locations::LocationTable;
use super::types::{AuctionType, MarketOrder};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Why an order was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    NotAnOffer,
    UntrackedLocation,
    Expired,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotAnOffer => write!(f, "not a sell offer"),
            Rejection::UntrackedLocation => write!(f, "location not tracked"),
            Rejection::Expired => write!(f, "order expired"),
        }
    }
}

pub struct AdmissionFilter {
    locations: Arc<LocationTable>,
}

impl AdmissionFilter {
    pub fn new(locations: Arc<LocationTable>) -> Self {
        Self { locations }
    }

    /// Decide whether `order` may enter the cache at time `now`
    pub fn admit(&self, order: &MarketOrder, now: DateTime<Utc>) -> Result<(), Rejection> {
        if order.auction_type != AuctionType::Offer {
            return Err(Rejection::NotAnOffer);
        }
        if !self.locations.is_tracked(&order.location_id) {
            return Err(Rejection::UntrackedLocation);
        }
        if order.expires <= now {
            return Err(Rejection::Expired);
        }
        Ok(())
    }
}
