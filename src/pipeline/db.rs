//! Best-price sink: trait plus SQLite implementation
//!
//! Table written (see `/sql/`):
//! - `market_prices` - UPSERT on composite_key (current best price only, no history)

use super::types::PriceRecord;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("price {price} for {composite_key} does not fit an SQLite integer")]
    PriceOutOfRange { composite_key: String, price: u64 },

    #[error("sink is closed")]
    Closed,

    #[error("sink task failed: {0}")]
    Task(String),
}

/// Batched idempotent upsert keyed by composite key
#[async_trait]
pub trait PriceSink: Send + Sync {
    /// Create-or-update every record in one call
    ///
    /// Returns the number of rows written. No cross-row atomicity is promised
    /// to callers; the batch either reports success or an error.
    async fn upsert_batch(&self, records: Vec<PriceRecord>) -> Result<usize, SinkError>;

    /// Release the underlying connection
    async fn close(&self) -> Result<(), SinkError>;

    /// Backend name for logging
    fn backend_type(&self) -> &'static str;
}

/// Run schema migrations from SQL files
///
/// Reads all .sql files from `schema_dir` in filename order and executes them.
/// Every file must use `IF NOT EXISTS` so reruns are harmless.
pub fn run_schema_migrations(conn: &mut Connection, schema_dir: &str) -> Result<(), SinkError> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.exists() {
        return Err(SinkError::Schema(format!("Schema directory not found: {}", schema_dir)));
    }

    conn.pragma_update(None, "journal_mode", "WAL")?;
    log::info!("📊 Enabled WAL mode for SQLite database");

    // Sorted so 01_, 02_, ... apply in order
    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();
    sql_files.sort();

    log::info!("🔧 Running schema migrations from: {}", schema_dir);

    for path in sql_files {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        log::info!("   ├─ Executing: {}", filename);
        let sql_content = fs::read_to_string(&path)?;
        conn.execute_batch(&sql_content)?;
    }

    log::info!("✅ All schema migrations completed successfully");
    Ok(())
}

const UPSERT_SQL: &str = r#"
    INSERT INTO market_prices (
        composite_key, item_id, item_name, quality, enchantment,
        price, location_id, location_name, tier, raw_item_id,
        expires_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
    ON CONFLICT(composite_key) DO UPDATE SET
        item_id = excluded.item_id,
        item_name = excluded.item_name,
        quality = excluded.quality,
        enchantment = excluded.enchantment,
        price = excluded.price,
        location_id = excluded.location_id,
        location_name = excluded.location_name,
        tier = excluded.tier,
        raw_item_id = excluded.raw_item_id,
        expires_at = excluded.expires_at,
        updated_at = excluded.updated_at
"#;

/// SQLite implementation of PriceSink
///
/// The connection sits behind a mutex and every write runs on the blocking
/// pool, so a slow disk never parks an async worker.
pub struct SqlitePriceSink {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqlitePriceSink {
    /// Open (or create) the database and apply migrations from `schema_dir`
    pub fn open(db_path: impl AsRef<Path>, schema_dir: &str) -> Result<Self, SinkError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(db_path)?;
        run_schema_migrations(&mut conn, schema_dir)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    fn write_records(conn: &mut Connection, records: &[PriceRecord]) -> Result<usize, SinkError> {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
            for record in records {
                let price = i64::try_from(record.price).map_err(|_| SinkError::PriceOutOfRange {
                    composite_key: record.composite_key.clone(),
                    price: record.price,
                })?;
                stmt.execute(rusqlite::params![
                    record.composite_key,
                    record.item_id,
                    record.item_name,
                    record.quality,
                    record.enchantment,
                    price,
                    record.location_id,
                    record.location_name,
                    record.tier,
                    record.raw_item_id,
                    record.expires_at,
                    record.updated_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Read back one row by composite key
    pub fn fetch_record(&self, composite_key: &str) -> Result<Option<PriceRecord>, SinkError> {
        let guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let conn = guard.as_ref().ok_or(SinkError::Closed)?;

        let record = conn
            .query_row(
                "SELECT composite_key, item_id, item_name, quality, enchantment,
                        price, location_id, location_name, tier, raw_item_id,
                        expires_at, updated_at
                 FROM market_prices WHERE composite_key = ?1",
                [composite_key],
                |row| {
                    Ok(PriceRecord {
                        composite_key: row.get(0)?,
                        item_id: row.get(1)?,
                        item_name: row.get(2)?,
                        quality: row.get(3)?,
                        enchantment: row.get(4)?,
                        price: u64::try_from(row.get::<_, i64>(5)?).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Integer, Box::new(e))
                        })?,
                        location_id: row.get(6)?,
                        location_name: row.get(7)?,
                        tier: row.get(8)?,
                        raw_item_id: row.get(9)?,
                        expires_at: row.get(10)?,
                        updated_at: row.get(11)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    pub fn record_count(&self) -> Result<usize, SinkError> {
        let guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let conn = guard.as_ref().ok_or(SinkError::Closed)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM market_prices", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl PriceSink for SqlitePriceSink {
    async fn upsert_batch(&self, records: Vec<PriceRecord>) -> Result<usize, SinkError> {
        if records.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            let conn = guard.as_mut().ok_or(SinkError::Closed)?;
            Self::write_records(conn, &records)
        })
        .await
        .map_err(|e| SinkError::Task(e.to_string()))?
    }

    async fn close(&self) -> Result<(), SinkError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let taken = conn.lock().unwrap_or_else(PoisonError::into_inner).take();
            match taken {
                Some(conn) => conn.close().map_err(|(_, e)| SinkError::Database(e)),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| SinkError::Task(e.to_string()))?
    }

    fn backend_type(&self) -> &'static str {
        "sqlite"
    }
}
