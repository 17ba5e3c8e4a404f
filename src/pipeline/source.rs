//! Order stream sources
//!
//! A source yields raw payloads; `run_order_source` pumps them into the
//! ingestion channel until told to stop, then releases the subscription and
//! forwards whatever was already in flight before closing the channel.

use async_nats::{Client, Subscriber};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to connect to NATS at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("failed to subscribe to {subject}: {reason}")]
    Subscribe { subject: String, reason: String },

    #[error("failed to release subscription: {0}")]
    Release(String),
}

#[async_trait]
pub trait OrderSource: Send {
    /// Next raw payload, or `None` once the stream has ended
    async fn next_payload(&mut self) -> Option<Vec<u8>>;

    /// Stop new deliveries; payloads already in flight stay readable
    async fn release(&mut self) -> Result<(), SourceError>;

    /// Source description for logging
    fn describe(&self) -> String;
}

/// NATS core subscription
pub struct NatsOrderSource {
    client: Client,
    subscriber: Subscriber,
    subject: String,
}

impl NatsOrderSource {
    pub async fn connect(url: &str, subject: &str) -> Result<Self, SourceError> {
        log::info!("🔌 Connecting to NATS at {}", url);
        let client = async_nats::connect(url).await.map_err(|e| SourceError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        log::info!("📡 Subscribing to subject: {}", subject);
        let subscriber = client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| SourceError::Subscribe {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            subscriber,
            subject: subject.to_string(),
        })
    }
}

#[async_trait]
impl OrderSource for NatsOrderSource {
    async fn next_payload(&mut self) -> Option<Vec<u8>> {
        self.subscriber.next().await.map(|message| message.payload.to_vec())
    }

    async fn release(&mut self) -> Result<(), SourceError> {
        self.subscriber
            .unsubscribe()
            .await
            .map_err(|e| SourceError::Release(e.to_string()))?;
        self.client
            .flush()
            .await
            .map_err(|e| SourceError::Release(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("nats:{}", self.subject)
    }
}

/// In-process source fed through an mpsc channel
///
/// Used to embed the pipeline behind another transport and in tests.
pub struct ChannelOrderSource {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl ChannelOrderSource {
    pub fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self { rx }
    }

    /// A source plus the sender that feeds it
    pub fn channel(buffer: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl OrderSource for ChannelOrderSource {
    async fn next_payload(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    async fn release(&mut self) -> Result<(), SourceError> {
        // Buffered payloads remain readable after close
        self.rx.close();
        Ok(())
    }

    fn describe(&self) -> String {
        "channel".to_string()
    }
}

/// Pump payloads from `source` into the ingestion channel
///
/// On `stop`: release the subscription, forward the payloads that were
/// already delivered, then drop `tx` so ingestion sees the channel close.
/// Returns the number of payloads forwarded.
pub async fn run_order_source(
    mut source: Box<dyn OrderSource>,
    tx: mpsc::Sender<Vec<u8>>,
    stop: CancellationToken,
) -> u64 {
    let description = source.describe();
    log::info!("📥 Order source started: {}", description);
    let mut forwarded = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            payload = source.next_payload() => match payload {
                Some(payload) => {
                    if tx.send(payload).await.is_err() {
                        log::warn!("⚠️  Ingestion channel closed, stopping source");
                        return forwarded;
                    }
                    forwarded += 1;
                }
                None => {
                    log::warn!("⚠️  Order stream ended: {}", description);
                    return forwarded;
                }
            },
        }
    }

    log::info!("🔄 Releasing subscription: {}", description);
    if let Err(e) = source.release().await {
        log::error!("❌ {}", e);
    }

    let mut drained = 0u64;
    while let Some(payload) = source.next_payload().await {
        if tx.send(payload).await.is_err() {
            break;
        }
        drained += 1;
    }

    log::info!("✅ Subscription released ({} in-flight payloads drained)", drained);
    forwarded + drained
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_drains_in_flight_payloads() {
        let (feed, source) = ChannelOrderSource::channel(16);
        let (tx, mut rx) = mpsc::channel(16);
        let stop = CancellationToken::new();

        // Already delivered before stop
        for i in 0..3u8 {
            feed.send(vec![i]).await.unwrap();
        }
        stop.cancel();

        let forwarded = run_order_source(Box::new(source), tx, stop).await;
        assert_eq!(forwarded, 3);

        let mut received = Vec::new();
        while let Some(payload) = rx.recv().await {
            received.push(payload);
        }
        assert_eq!(received, vec![vec![0], vec![1], vec![2]]);

        // Released: the feed side can no longer deliver
        assert!(feed.send(vec![9]).await.is_err());
    }

    #[tokio::test]
    async fn test_stream_end_closes_channel() {
        let (feed, source) = ChannelOrderSource::channel(4);
        let (tx, mut rx) = mpsc::channel(4);

        feed.send(b"one".to_vec()).await.unwrap();
        drop(feed);

        let forwarded = run_order_source(Box::new(source), tx, CancellationToken::new()).await;
        assert_eq!(forwarded, 1);
        assert_eq!(rx.recv().await, Some(b"one".to_vec()));
        assert_eq!(rx.recv().await, None);
    }
}
