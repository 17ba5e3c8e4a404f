//! # Best-Price Pipeline
//!
//! Reduces a high-volume, possibly duplicated stream of market orders into a
//! compact table holding the cheapest live sell offer per
//! (item, quality, enchantment, location).
//!
//! ## Architecture
//!
//! ```text
//! OrderSource (NATS) ──▶ mpsc ──▶ ingestion: decode → AdmissionFilter → BestPriceCache::offer
//!                                                                              │
//!                        flush scheduler (every FLUSH_INTERVAL_MS) ◀───────────┘
//!                                 │ snapshot_and_clear
//!                                 ▼
//!                        PriceFlusher → PriceSink::upsert_batch (SQLite)
//! ```
//!
//! **Key principle:** the cache is a per-window accumulator. It is emptied on
//! every flush; long-lived state exists only in the sink. A failed flush drops
//! that window, the next one re-aggregates current market state.
//!
//! ## Module Organization
//!
//! - `types` - Wire decoding (`MarketOrder`) and stored rows (`PriceRecord`)
//! - `normalizer` - Item id normalization, composite keys, tiers
//! - `locations` - Tracked markets and their names
//! - `catalog` - Item display names
//! - `filter` - Admission rules
//! - `cache` - Best-price window
//! - `ingestion` - Channel consumer
//! - `scheduler` - Periodic flush loop
//! - `flusher` - Batch → upsert rows
//! - `db` - Sink trait and SQLite implementation
//! - `source` - Stream sources
//! - `shutdown` - Lifecycle and drain protocol
//! - `config` - Environment configuration

pub mod types;
pub mod normalizer;
pub mod locations;
pub mod catalog;
pub mod filter;
pub mod cache;
pub mod ingestion;
pub mod scheduler;
pub mod flusher;
pub mod db;
pub mod source;
pub mod shutdown;
pub mod config;

// Re-export commonly used types
pub use types::{AuctionType, LocationId, MarketOrder, PriceRecord};
pub use normalizer::{normalize_item_id, CompositeKey};
pub use locations::LocationTable;
pub use catalog::ItemCatalog;
pub use filter::{AdmissionFilter, Rejection};
pub use cache::{BestPriceCache, FlushBatch, OfferOutcome};
pub use flusher::PriceFlusher;
pub use db::{PriceSink, SinkError, SqlitePriceSink};
pub use source::{ChannelOrderSource, NatsOrderSource, OrderSource};
pub use shutdown::{LifecycleState, ShutdownCoordinator, ShutdownReport};
pub use config::PipelineConfig;
