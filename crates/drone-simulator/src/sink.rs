//! Downstream telemetry sinks.
//!
//! A sink receives one [`TickBatch`] per delivery. Delivery is at most once:
//! the coordinator logs a failed batch and moves on to the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::{broadcast, mpsc};
use tracing::{Level, debug, info};

use crate::error::SinkError;
use crate::snapshot::{TickBatch, fleet_key};

/// Destination for completed tick batches.
#[async_trait]
pub trait TelemetrySink: Send {
    /// Hand one batch downstream.
    async fn deliver(&mut self, batch: &TickBatch) -> Result<(), SinkError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

// =============================================================================
// LOG
// =============================================================================

/// Writes batches to the log instead of a transport (dry run).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl TelemetrySink for LogSink {
    async fn deliver(&mut self, batch: &TickBatch) -> Result<(), SinkError> {
        info!(tick = batch.tick_number, records = batch.len(), "Tick batch");

        if tracing::enabled!(Level::DEBUG) {
            for snapshot in &batch.snapshots {
                debug!(
                    key = %fleet_key(&snapshot.fleet_name),
                    tick = snapshot.tick_number,
                    record = %snapshot.drone.to_json()?,
                    "Telemetry"
                );
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

// =============================================================================
// CHANNELS
// =============================================================================

/// Forwards batches into an in-process pipeline.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TickBatch>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TickBatch>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TelemetrySink for ChannelSink {
    async fn deliver(&mut self, batch: &TickBatch) -> Result<(), SinkError> {
        self.tx
            .send(batch.clone())
            .await
            .map_err(|_| SinkError::Closed)
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Fans batches out to every live subscriber, e.g. WebSocket sessions.
///
/// Slow subscribers lag and lose batches; they never hold the simulation
/// back.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Arc<TickBatch>>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TickBatch>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl TelemetrySink for BroadcastSink {
    async fn deliver(&mut self, batch: &TickBatch) -> Result<(), SinkError> {
        self.tx
            .send(Arc::new(batch.clone()))
            .map(|_| ())
            .map_err(|_| SinkError::NoSubscribers)
    }

    fn name(&self) -> &'static str {
        "broadcast"
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// POSTs each batch as JSON to an ingest endpoint.
///
/// Every request is bounded by `timeout`; a silent endpoint costs one failed
/// delivery, never a stalled tick loop.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    url: String,
}

impl HttpSink {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TelemetrySink for HttpSink {
    async fn deliver(&mut self, batch: &TickBatch) -> Result<(), SinkError> {
        let response = self.client.post(&self.url).json(batch).send().await?;

        if !response.status().is_success() {
            return Err(SinkError::Rejected {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drone::Drone;
    use crate::snapshot::DroneSnapshot;
    use drone_domain::Coordinate;
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn batch(tick: u64) -> TickBatch {
        let drone = Drone::new(
            "air1-0",
            Coordinate::new(3.0, 3.0),
            vec![Coordinate::new(9.0, 5.0)],
            5.0,
        );
        TickBatch::new(
            Uuid::new_v4(),
            tick,
            vec![DroneSnapshot::capture("air1", &drone, false, tick)],
        )
    }

    #[tokio::test]
    async fn test_log_sink_accepts_batches() {
        let mut sink = LogSink;
        assert_ok!(sink.deliver(&batch(1)).await);
        assert_eq!(sink.name(), "log");
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (mut sink, mut rx) = ChannelSink::new(4);
        assert_ok!(sink.deliver(&batch(3)).await);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.tick_number, 3);
        assert_eq!(received.len(), 1);
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (mut sink, rx) = ChannelSink::new(4);
        drop(rx);

        let err = assert_err!(sink.deliver(&batch(1)).await);
        assert!(matches!(err, SinkError::Closed));
    }

    #[tokio::test]
    async fn test_broadcast_sink_requires_subscribers() {
        let mut sink = BroadcastSink::new(8);
        let err = assert_err!(sink.deliver(&batch(1)).await);
        assert!(matches!(err, SinkError::NoSubscribers));

        let mut first = sink.subscribe();
        let mut second = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 2);
        assert_ok!(sink.deliver(&batch(2)).await);

        assert_eq!(first.recv().await.unwrap().tick_number, 2);
        assert_eq!(second.recv().await.unwrap().tick_number, 2);
    }

    #[tokio::test]
    async fn test_http_sink_reports_transport_failure() {
        let mut sink =
            HttpSink::new("http://127.0.0.1:9/telemetry", Duration::from_secs(2)).unwrap();
        assert_eq!(sink.url(), "http://127.0.0.1:9/telemetry");

        let err = assert_err!(sink.deliver(&batch(1)).await);
        assert!(matches!(err, SinkError::Http(_)));
    }

    #[tokio::test]
    async fn test_http_sink_times_out_on_silent_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut sink =
            HttpSink::new(format!("http://{addr}/telemetry"), Duration::from_millis(200)).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), sink.deliver(&batch(1))).await;

        let err = assert_err!(outcome.expect("delivery hung past its timeout"));
        assert!(matches!(err, SinkError::Http(ref e) if e.is_timeout()));
        server.abort();
    }
}
