//! Pipeline Runtime - best-price aggregation service
//!
//! This binary orchestrates the pipeline:
//! - Opens the SQLite best-price table (schema from `sql/`)
//! - Loads the item name catalog (non-fatal on failure)
//! - Subscribes to the NATS order subject
//! - Spawns ingestion and the flush scheduler
//! - Drains and flushes on SIGINT/SIGTERM
//!
//! Usage:
//!   cargo run --release --bin pipeline_runtime
//!
//! Environment variables:
//!   MARKETFLUSH_DB_PATH - SQLite database path (default: marketflush.db)
//!   NATS_URL - NATS server (default: nats://localhost:4222)
//!   NATS_SUBJECT - Order subject (default: marketorders.deduped)
//!   FLUSH_INTERVAL_MS - Flush window (default: 1000)
//!   ITEM_CATALOG_PATH - Item name dump (default: items.json)
//!   TRACKED_LOCATIONS - id:Name list (default: all public markets)

use dotenv::dotenv;
use log::{error, info};
use marketflush::pipeline::{
    config::PipelineConfig,
    shutdown::{abort_startup, wait_for_termination},
    AdmissionFilter, BestPriceCache, ItemCatalog, NatsOrderSource, PriceFlusher, PriceSink,
    ShutdownCoordinator, SqlitePriceSink,
};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Pipeline Runtime - best-price aggregation");
    info!("   └─ Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            return ExitCode::from(abort_startup(None).await);
        }
    };

    info!("✅ Configuration loaded");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ NATS: {} ({})", config.nats_url, config.nats_subject);
    info!("   ├─ Flush interval: {}ms", config.flush_interval.as_millis());
    info!("   ├─ Channel buffer: {} payloads", config.channel_buffer);
    info!("   ├─ Catalog: {}", config.catalog_path);
    info!("   └─ Tracked markets: {}", config.locations.len());
    for (id, name) in config.locations.iter() {
        info!("      • {} ({})", name, id);
    }

    // Initialize database
    info!("🔧 Initializing database...");
    let sink: Arc<dyn PriceSink> = match SqlitePriceSink::open(&config.db_path, &config.schema_dir) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            error!("❌ Failed to open database {}: {}", config.db_path, e);
            return ExitCode::from(abort_startup(None).await);
        }
    };
    info!("✅ Database initialized");

    // Reference data never blocks startup
    let catalog = Arc::new(ItemCatalog::load_or_empty(&config.catalog_path));

    // Connect stream source
    let source = match NatsOrderSource::connect(&config.nats_url, &config.nats_subject).await {
        Ok(source) => source,
        Err(e) => {
            error!("❌ {}", e);
            return ExitCode::from(abort_startup(Some(sink)).await);
        }
    };
    info!("✅ Subscribed to {}", config.nats_subject);

    let locations = Arc::new(config.locations.clone());
    let filter = Arc::new(AdmissionFilter::new(locations.clone()));
    let cache = Arc::new(BestPriceCache::new());
    let flusher = PriceFlusher::new(catalog, locations, sink);

    let coordinator = ShutdownCoordinator::launch(
        Box::new(source),
        filter,
        cache,
        flusher,
        config.flush_interval,
        config.channel_buffer,
    );

    info!("🔄 Press CTRL+C to shutdown gracefully");

    let report = coordinator.run_until(wait_for_termination()).await;

    info!(
        "✅ Pipeline runtime stopped (residual: {}, late: {})",
        report.residual_records, report.late_records
    );
    ExitCode::from(report.exit_code)
}
