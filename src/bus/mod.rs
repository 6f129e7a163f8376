//! # Telemetry & Command Boundary
//!
//! Outbound: every weather metric, device state and energy balance figure is
//! published as one [`TelemetryMessage`] per metric to a per-entity topic:
//!
//! ```text
//! <prefix>/<environment-id>/weather/<metric>
//! <prefix>/<environment-id>/device/<device-id>/<metric>
//! <prefix>/<environment-id>/energy/<metric>
//! ```
//!
//! Inbound: [`DeviceCommand`]s issued by an optimizer, addressed by device id.
//!
//! Publishing is best-effort. A failing sink is logged by the [`Publisher`]
//! and never aborts the tick that produced the message.

pub mod command;
pub mod sinks;

pub use command::{CommandStatus, DeviceCommand};
pub use sinks::{log_subscriber, BroadcastSink, LogSink, MemorySink};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::domain::{DeviceId, EnvironmentId};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("No subscriber attached to telemetry channel")]
    NoSubscriber,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// A single metric reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub name: String,
    pub value: f64,
    pub unit: String,
    /// Simulated time, unix seconds
    pub timestamp: i64,
}

impl TelemetryMessage {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            timestamp,
        }
    }

    pub fn flag(name: impl Into<String>, on: bool, timestamp: i64) -> Self {
        Self::new(name, if on { 1.0 } else { 0.0 }, "bool", timestamp)
    }

    pub fn to_json(&self) -> Result<String, TelemetryError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Transport for outbound telemetry
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, topic: &str, message: &TelemetryMessage) -> Result<(), TelemetryError>;
}

/// Builds topics and forwards messages to the configured sink
#[derive(Clone)]
pub struct Publisher {
    prefix: String,
    sink: Arc<dyn TelemetrySink>,
}

impl Publisher {
    pub fn new(prefix: impl Into<String>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            prefix: prefix.into(),
            sink,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn weather_topic(&self, env: EnvironmentId, metric: &str) -> String {
        format!("{}/{}/weather/{}", self.prefix, env, metric)
    }

    pub fn device_topic(&self, env: EnvironmentId, device: DeviceId, metric: &str) -> String {
        format!("{}/{}/device/{}/{}", self.prefix, env, device, metric)
    }

    pub fn energy_topic(&self, env: EnvironmentId, metric: &str) -> String {
        format!("{}/{}/energy/{}", self.prefix, env, metric)
    }

    /// Publish and swallow transport failures
    pub fn publish(&self, topic: &str, message: TelemetryMessage) {
        if let Err(e) = self.sink.publish(topic, &message) {
            warn!(%topic, error = %e, "telemetry publish failed");
        }
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").field("prefix", &self.prefix).finish()
    }
}
