use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

use super::{DeviceClass, DeviceId, EnergySource, Name, SmartDevice};
use crate::bus::{CommandStatus, DeviceCommand, TelemetryMessage};
use crate::error::{Result, SimError};
use crate::simulation::{EnvironmentRef, ThermalLoad};
use crate::weather::Weather;

/// Activation state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeviceState {
    #[default]
    Disabled,
    Enabled,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Disabled => write!(f, "disabled"),
            DeviceState::Enabled => write!(f, "enabled"),
        }
    }
}

/// Identity, activation state and owner link shared by every device kind
#[derive(Debug, Clone)]
pub struct DeviceCore {
    id: DeviceId,
    name: Name,
    state: DeviceState,
    owner: EnvironmentRef,
}

impl DeviceCore {
    pub fn new(name: &str, owner: EnvironmentRef) -> Result<Self> {
        Ok(Self {
            id: DeviceId::new(),
            name: Name::parse(name)?,
            state: DeviceState::Disabled,
            owner,
        })
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.name = Name::parse(name)?;
        Ok(())
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == DeviceState::Enabled
    }

    pub fn owner(&self) -> &EnvironmentRef {
        &self.owner
    }

    pub fn enable(&mut self) -> Result<()> {
        match self.state {
            DeviceState::Enabled => Err(SimError::illegal_transition(format!(
                "device {} is already enabled",
                self.name
            ))),
            DeviceState::Disabled => {
                self.state = DeviceState::Enabled;
                Ok(())
            }
        }
    }

    pub fn disable(&mut self) -> Result<()> {
        match self.state {
            DeviceState::Disabled => Err(SimError::illegal_transition(format!(
                "device {} is already disabled",
                self.name
            ))),
            DeviceState::Enabled => {
                self.state = DeviceState::Disabled;
                Ok(())
            }
        }
    }

    pub fn timestamp(&self) -> Result<i64> {
        self.owner.timestamp()
    }

    pub fn publish(&self, message: TelemetryMessage) -> Result<()> {
        self.owner.publish_device(self.id, message)
    }

    pub fn publish_active(&self, ts: i64) -> Result<()> {
        self.publish(TelemetryMessage::flag("is_active", self.is_active(), ts))
    }
}

/// What a device sees of its environment during its update
pub struct DeviceContext<'a> {
    weather: &'a Weather,
    ambient_temperature: f64,
    load: &'a mut ThermalLoad,
}

impl<'a> DeviceContext<'a> {
    pub fn new(weather: &'a Weather, ambient_temperature: f64, load: &'a mut ThermalLoad) -> Self {
        Self {
            weather,
            ambient_temperature,
            load,
        }
    }

    pub fn weather(&self) -> &Weather {
        self.weather
    }

    /// Temperature of the zone the device sits in
    pub fn ambient_temperature(&self) -> f64 {
        self.ambient_temperature
    }

    pub fn brightness(&self) -> f64 {
        self.weather.brightness()
    }

    pub fn apply_heating(&mut self, watt: f64) {
        self.load.heating_power += watt;
    }

    pub fn apply_cooling(&mut self, watt: f64) {
        self.load.cooling_power += watt;
    }

    pub fn apply_lighting(&mut self, lumens: f64) {
        self.load.lighting_lumens += lumens;
    }
}

/// Device listing entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSummary {
    pub id: DeviceId,
    pub name: String,
    pub class: DeviceClass,
    pub state: DeviceState,
}

/// Root capability of everything installed in an environment
pub trait Device: Send + fmt::Debug {
    fn core(&self) -> &DeviceCore;

    fn core_mut(&mut self) -> &mut DeviceCore;

    fn class(&self) -> DeviceClass;

    /// Per-tick hook
    fn update(&mut self, millis_passed: u64, ctx: &mut DeviceContext<'_>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn as_energy_source(&self) -> Option<&dyn EnergySource> {
        None
    }

    fn as_smart_device(&self) -> Option<&dyn SmartDevice> {
        None
    }

    fn as_smart_device_mut(&mut self) -> Option<&mut dyn SmartDevice> {
        None
    }

    fn id(&self) -> DeviceId {
        self.core().id()
    }

    fn name(&self) -> &str {
        self.core().name()
    }

    fn is_active(&self) -> bool {
        self.core().is_active()
    }

    fn enable(&mut self) -> Result<()> {
        self.core_mut().enable()
    }

    fn disable(&mut self) -> Result<()> {
        self.core_mut().disable()
    }

    fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            id: self.id(),
            name: self.name().to_string(),
            class: self.class(),
            state: self.core().state(),
        }
    }

    /// Apply an optimizer command; repeated ON/OFF commands are idempotent
    fn apply_command(&mut self, command: &DeviceCommand) -> Result<()> {
        let level = command.requested_level()?;

        match command.status {
            CommandStatus::On | CommandStatus::Economy if !self.is_active() => self.enable()?,
            CommandStatus::Off if self.is_active() => self.disable()?,
            _ => {}
        }

        if let Some(smart) = self.as_smart_device_mut() {
            if let Some(level) = level {
                smart.set_level(level)?;
            }
            if let Some(target) = command.target_value {
                smart.set_setpoint(target);
            }
        }
        Ok(())
    }
}
