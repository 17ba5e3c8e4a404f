//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use marketflush::pipeline::db::{PriceSink, SinkError};
use marketflush::pipeline::source::{OrderSource, SourceError};
use marketflush::pipeline::types::PriceRecord;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Ordered log of lifecycle events shared between fixtures
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Sink that keeps every batch in memory
pub struct RecordingSink {
    pub log: EventLog,
    pub batches: Mutex<Vec<Vec<PriceRecord>>>,
}

impl RecordingSink {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<PriceRecord> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl PriceSink for RecordingSink {
    async fn upsert_batch(&self, records: Vec<PriceRecord>) -> Result<usize, SinkError> {
        let len = records.len();
        self.log.push(format!("upsert:{}", len));
        self.batches.lock().unwrap().push(records);
        Ok(len)
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.log.push("close");
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "recording"
    }
}

/// Sink whose writes always fail
#[derive(Default)]
pub struct FailingSink {
    pub attempts: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FailingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSink for FailingSink {
    async fn upsert_batch(&self, _records: Vec<PriceRecord>) -> Result<usize, SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Schema("market_prices is read-only".to_string()))
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "failing"
    }
}

/// Sink that writes fine but cannot be closed cleanly
#[derive(Default)]
pub struct UncloseableSink {
    pub written: AtomicUsize,
    pub close_attempts: AtomicUsize,
}

#[async_trait]
impl PriceSink for UncloseableSink {
    async fn upsert_batch(&self, records: Vec<PriceRecord>) -> Result<usize, SinkError> {
        self.written.fetch_add(records.len(), Ordering::SeqCst);
        Ok(records.len())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.close_attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Task("connection already torn down".to_string()))
    }

    fn backend_type(&self) -> &'static str {
        "uncloseable"
    }
}

/// Channel-fed source that records when its subscription is released
pub struct ScriptedSource {
    rx: mpsc::Receiver<Vec<u8>>,
    log: EventLog,
}

impl ScriptedSource {
    pub fn new(buffer: usize, log: EventLog) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx, log })
    }
}

#[async_trait]
impl OrderSource for ScriptedSource {
    async fn next_payload(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    async fn release(&mut self) -> Result<(), SourceError> {
        self.log.push("release");
        self.rx.close();
        Ok(())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// JSON for a sell offer expiring tomorrow
pub fn offer_json(item: &str, quality: u8, location: u32, price: u64) -> serde_json::Value {
    serde_json::json!({
        "Id": 1,
        "ItemTypeId": item,
        "QualityLevel": quality,
        "EnchantmentLevel": 0,
        "LocationId": location,
        "UnitPriceSilver": price,
        "Amount": 1,
        "AuctionType": "offer",
        "Expires": (Utc::now() + ChronoDuration::days(1)).to_rfc3339(),
    })
}

pub fn offer_payload(item: &str, quality: u8, location: u32, price: u64) -> Vec<u8> {
    offer_json(item, quality, location, price).to_string().into_bytes()
}

/// Poll `condition` every 5ms, panicking after two seconds
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
