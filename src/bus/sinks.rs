use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::{TelemetryError, TelemetryMessage, TelemetrySink};

/// Emits every message as a structured tracing event
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn publish(&self, topic: &str, message: &TelemetryMessage) -> Result<(), TelemetryError> {
        info!(
            %topic,
            name = %message.name,
            value = message.value,
            unit = %message.unit,
            ts = message.timestamp,
            "telemetry"
        );
        Ok(())
    }
}

/// Messages kept by [`MemorySink::new`]
pub const DEFAULT_HISTORY_LIMIT: usize = 100_000;

/// In-process store retaining the last value per topic plus a bounded history
#[derive(Debug)]
pub struct MemorySink {
    inner: Mutex<MemoryInner>,
    history_limit: usize,
}

#[derive(Debug, Default)]
struct MemoryInner {
    retained: HashMap<String, TelemetryMessage>,
    history: VecDeque<(String, TelemetryMessage)>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` messages of history; the oldest are dropped first
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
            history_limit: limit,
        }
    }

    /// Last message published to `topic`
    pub fn retained(&self, topic: &str) -> Option<TelemetryMessage> {
        self.inner.lock().retained.get(topic).cloned()
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.inner.lock().retained.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn history(&self) -> Vec<(String, TelemetryMessage)> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Number of messages ever published to topics ending in `suffix`
    pub fn count_suffix(&self, suffix: &str) -> usize {
        self.inner
            .lock()
            .history
            .iter()
            .filter(|(topic, _)| topic.ends_with(suffix))
            .count()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.retained.clear();
        inner.history.clear();
    }
}

impl TelemetrySink for MemorySink {
    fn publish(&self, topic: &str, message: &TelemetryMessage) -> Result<(), TelemetryError> {
        let mut inner = self.inner.lock();
        inner.retained.insert(topic.to_string(), message.clone());
        if self.history_limit == 0 {
            return Ok(());
        }
        if inner.history.len() == self.history_limit {
            inner.history.pop_front();
        }
        inner.history.push_back((topic.to_string(), message.clone()));
        Ok(())
    }
}

/// Fans messages out as `(topic, json payload)` pairs to channel subscribers
#[derive(Debug)]
pub struct BroadcastSink {
    tx: broadcast::Sender<(String, String)>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, String)> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Drain a broadcast subscription into debug events until the sink is dropped
///
/// A lagging receiver skips what it missed and keeps listening.
pub async fn log_subscriber(mut rx: broadcast::Receiver<(String, String)>) {
    loop {
        match rx.recv().await {
            Ok((topic, payload)) => debug!(%topic, %payload, "broadcast telemetry"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "telemetry subscriber lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

impl TelemetrySink for BroadcastSink {
    fn publish(&self, topic: &str, message: &TelemetryMessage) -> Result<(), TelemetryError> {
        let payload = message.to_json()?;
        self.tx
            .send((topic.to_string(), payload))
            .map(|_| ())
            .map_err(|_| TelemetryError::NoSubscriber)
    }
}
