//! Non-owning upward links from weather and devices to their owners.
//!
//! A [`SimulationRef`] holds a `Weak` pointer to the simulation's shared
//! context; an [`EnvironmentRef`] adds the owning environment's id and
//! checks it against the simulation's live registry on every access. Both
//! fail with [`SimError::OwnerGone`] once the owner has been discarded, so a
//! detached device can never read stale clock data or publish under a dead
//! environment.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

use super::clock::SimClock;
use crate::bus::{Publisher, TelemetryMessage};
use crate::domain::{DeviceId, EnvironmentId};
use crate::error::{Result, SimError};

/// State shared between a simulation, its background loop and every back-reference
#[derive(Debug)]
pub struct SimulationContext {
    pub(crate) clock: RwLock<SimClock>,
    pub(crate) live_environments: RwLock<Vec<EnvironmentId>>,
    pub(crate) publisher: Publisher,
}

impl SimulationContext {
    pub(crate) fn new(clock: SimClock, publisher: Publisher) -> Self {
        Self {
            clock: RwLock::new(clock),
            live_environments: RwLock::new(Vec::new()),
            publisher,
        }
    }

    pub(crate) fn register(&self, id: EnvironmentId) {
        self.live_environments.write().push(id);
    }

    pub(crate) fn unregister(&self, id: EnvironmentId) {
        self.live_environments.write().retain(|live| *live != id);
    }

    fn is_live(&self, id: EnvironmentId) -> bool {
        self.live_environments.read().contains(&id)
    }
}

#[derive(Debug, Clone)]
pub struct SimulationRef {
    context: Weak<SimulationContext>,
}

impl SimulationRef {
    pub(crate) fn new(context: &Arc<SimulationContext>) -> Self {
        Self {
            context: Arc::downgrade(context),
        }
    }

    fn context(&self) -> Result<Arc<SimulationContext>> {
        self.context.upgrade().ok_or(SimError::OwnerGone("simulation"))
    }

    pub fn current_date(&self) -> Result<DateTime<Utc>> {
        Ok(self.context()?.clock.read().current_date())
    }

    pub fn hour_of_day(&self) -> Result<f64> {
        Ok(self.context()?.clock.read().hour_of_day())
    }

    pub fn is_alive(&self) -> bool {
        self.context.strong_count() > 0
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentRef {
    simulation: SimulationRef,
    environment: EnvironmentId,
}

impl EnvironmentRef {
    pub(crate) fn new(simulation: SimulationRef, environment: EnvironmentId) -> Self {
        Self {
            simulation,
            environment,
        }
    }

    /// Id of the environment this link points at, without checking liveness
    pub fn id(&self) -> EnvironmentId {
        self.environment
    }

    pub fn simulation(&self) -> &SimulationRef {
        &self.simulation
    }

    /// Resolve the owner, failing if either the simulation or the environment is gone
    pub fn resolve(&self) -> Result<EnvironmentId> {
        let context = self.simulation.context()?;
        if context.is_live(self.environment) {
            Ok(self.environment)
        } else {
            Err(SimError::OwnerGone("environment"))
        }
    }

    fn live_context(&self) -> Result<Arc<SimulationContext>> {
        self.resolve()?;
        self.simulation.context()
    }

    /// Simulated timestamp in unix seconds, stamped on outbound telemetry
    pub fn timestamp(&self) -> Result<i64> {
        Ok(self.live_context()?.clock.read().current_date().timestamp())
    }

    pub fn hour_of_day(&self) -> Result<f64> {
        Ok(self.live_context()?.clock.read().hour_of_day())
    }

    pub fn publish_weather(&self, message: TelemetryMessage) -> Result<()> {
        let context = self.live_context()?;
        let topic = context.publisher.weather_topic(self.environment, &message.name);
        context.publisher.publish(&topic, message);
        Ok(())
    }

    pub fn publish_device(&self, device: DeviceId, message: TelemetryMessage) -> Result<()> {
        let context = self.live_context()?;
        let topic = context.publisher.device_topic(self.environment, device, &message.name);
        context.publisher.publish(&topic, message);
        Ok(())
    }

    pub fn publish_energy(&self, message: TelemetryMessage) -> Result<()> {
        let context = self.live_context()?;
        let topic = context.publisher.energy_topic(self.environment, &message.name);
        context.publisher.publish(&topic, message);
        Ok(())
    }
}
