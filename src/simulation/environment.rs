//! # Environment
//!
//! A modelled zone: one [`Weather`] instance, an ordered set of devices and
//! a lumped thermal mass. Each update runs weather first, then every device
//! in insertion order, then settles the tick's thermal load into the zone
//! temperature and balances produced against consumed energy.

use serde::{Deserialize, Serialize};

use super::owner::EnvironmentRef;
use crate::bus::TelemetryMessage;
use crate::config::DeviceConfig;
use crate::domain::{
    Device, DeviceClass, DeviceContext, DeviceFactory, DeviceId, DeviceSummary, ElectricGrid, EnergyStorage, EnvironmentId, Name,
};
use crate::error::{Result, SimError};
use crate::weather::{Weather, WeatherClass, WeatherState};

pub const DEFAULT_TEMPERATURE: f64 = 21.0;
pub const DEFAULT_INSULATION: f64 = 0.85;

/// Fraction of the inside/outside gap crossing the envelope per update
const DIFFUSION_COEFFICIENT: f64 = 0.01;
/// °C gained per kWh of heating
const HEATING_GAIN: f64 = 1.8;
/// °C lost per kWh of cooling
const COOLING_LOSS: f64 = 2.0;

/// Power and light contributed by devices during a single tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThermalLoad {
    /// W
    pub heating_power: f64,
    /// W
    pub cooling_power: f64,
    /// lm
    pub lighting_lumens: f64,
}

impl ThermalLoad {
    pub fn net_heating_watt(&self) -> f64 {
        self.heating_power - self.cooling_power
    }

    pub fn is_idle(&self) -> bool {
        self.heating_power == 0.0 && self.cooling_power == 0.0 && self.lighting_lumens == 0.0
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Energy flows of the last tick, kWh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyBalance {
    pub production_kwh: f64,
    pub consumption_kwh: f64,
    pub stored_kwh: f64,
    pub discharged_kwh: f64,
    pub grid_import_kwh: f64,
    pub grid_export_kwh: f64,
    /// Demand no storage or grid could cover
    pub unmet_kwh: f64,
    /// Surplus with nowhere to go
    pub curtailed_kwh: f64,
}

impl EnergyBalance {
    pub fn net_kwh(&self) -> f64 {
        self.production_kwh - self.consumption_kwh
    }

    fn metrics(&self, ts: i64) -> [TelemetryMessage; 8] {
        [
            TelemetryMessage::new("production", self.production_kwh, "kWh", ts),
            TelemetryMessage::new("consumption", self.consumption_kwh, "kWh", ts),
            TelemetryMessage::new("stored", self.stored_kwh, "kWh", ts),
            TelemetryMessage::new("discharged", self.discharged_kwh, "kWh", ts),
            TelemetryMessage::new("grid_import", self.grid_import_kwh, "kWh", ts),
            TelemetryMessage::new("grid_export", self.grid_export_kwh, "kWh", ts),
            TelemetryMessage::new("unmet", self.unmet_kwh, "kWh", ts),
            TelemetryMessage::new("curtailed", self.curtailed_kwh, "kWh", ts),
        ]
    }
}

/// Read-only view of an environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub id: EnvironmentId,
    pub name: String,
    pub weather_class: WeatherClass,
    pub temperature: f64,
    pub insulation: f64,
    pub weather: WeatherState,
    pub devices: Vec<DeviceSummary>,
    pub last_balance: EnergyBalance,
}

#[derive(Debug)]
pub struct Environment {
    id: EnvironmentId,
    name: Name,
    owner: EnvironmentRef,
    weather: Weather,
    devices: Vec<Box<dyn Device>>,
    load: ThermalLoad,
    temperature: f64,
    insulation: f64,
    last_balance: EnergyBalance,
}

impl Environment {
    pub(crate) fn new(
        name: &str,
        owner: EnvironmentRef,
        weather_class: WeatherClass,
        initial_temperature: f64,
        insulation: f64,
        seed: Option<u64>,
    ) -> Result<Self> {
        let name = Name::parse(name)?;
        if !(0.0..=1.0).contains(&insulation) {
            return Err(SimError::validation(format!(
                "insulation must be between 0.0 and 1.0, got {insulation}"
            )));
        }
        if !initial_temperature.is_finite() {
            return Err(SimError::validation("initial temperature must be finite"));
        }
        let weather = Weather::for_class(weather_class, owner.clone(), seed)?;

        Ok(Self {
            id: owner.id(),
            name,
            owner,
            weather,
            devices: Vec::new(),
            load: ThermalLoad::default(),
            temperature: initial_temperature,
            insulation,
            last_balance: EnergyBalance::default(),
        })
    }

    pub fn id(&self) -> EnvironmentId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.name = Name::parse(name)?;
        Ok(())
    }

    /// Link handed to devices built for this environment
    pub fn owner_ref(&self) -> EnvironmentRef {
        self.owner.clone()
    }

    pub fn weather(&self) -> &Weather {
        &self.weather
    }

    pub fn weather_mut(&mut self) -> &mut Weather {
        &mut self.weather
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn insulation(&self) -> f64 {
        self.insulation
    }

    pub fn load(&self) -> &ThermalLoad {
        &self.load
    }

    pub fn last_balance(&self) -> &EnergyBalance {
        &self.last_balance
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

    /// Attach a device built against this environment's link
    pub fn add_device(&mut self, device: Box<dyn Device>) -> Result<DeviceId> {
        if device.core().owner().id() != self.id {
            return Err(SimError::validation(format!(
                "device {} belongs to another environment",
                device.name()
            )));
        }
        // indoor brightness is lumens and there is no wind
        if self.weather.class() == WeatherClass::Indoor
            && matches!(device.class(), DeviceClass::PhotoVoltaic | DeviceClass::WindTurbine)
        {
            return Err(SimError::validation(format!(
                "{} {} needs an outdoor environment",
                device.class(),
                device.name()
            )));
        }
        let id = device.id();
        tracing::debug!(environment = %self.name, device = device.name(), kind = %device.class(), "device added");
        self.devices.push(device);
        Ok(id)
    }

    /// Build a device with this environment as owner and attach it
    pub fn install<D, F>(&mut self, build: F) -> Result<DeviceId>
    where
        D: Device + 'static,
        F: FnOnce(EnvironmentRef) -> Result<D>,
    {
        let device = build(self.owner_ref())?;
        self.add_device(Box::new(device))
    }

    pub fn install_from_config(&mut self, config: &DeviceConfig) -> Result<DeviceId> {
        let device = DeviceFactory::build(self.owner_ref(), config)?;
        self.add_device(device)
    }

    pub fn devices(&self) -> impl Iterator<Item = &dyn Device> {
        self.devices.iter().map(|d| d.as_ref())
    }

    pub fn find_device(&self, id: DeviceId) -> Option<&dyn Device> {
        self.devices.iter().find(|d| d.id() == id).map(|d| d.as_ref())
    }

    pub fn find_device_mut(&mut self, id: DeviceId) -> Option<&mut dyn Device> {
        match self.devices.iter_mut().find(|d| d.id() == id) {
            Some(device) => Some(device.as_mut()),
            None => None,
        }
    }

    /// Typed access to a device
    pub fn device<T: Device + 'static>(&self, id: DeviceId) -> Option<&T> {
        self.find_device(id)?.as_any().downcast_ref::<T>()
    }

    pub fn device_mut<T: Device + 'static>(&mut self, id: DeviceId) -> Option<&mut T> {
        self.find_device_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    pub fn snapshot(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            id: self.id,
            name: self.name.to_string(),
            weather_class: self.weather.class(),
            temperature: self.temperature,
            insulation: self.insulation,
            weather: self.weather.state().clone(),
            devices: self.devices.iter().map(|d| d.summary()).collect(),
            last_balance: self.last_balance.clone(),
        }
    }

    /// Advance this zone by `millis` of simulated time
    pub fn update(&mut self, millis: u64) -> Result<()> {
        self.owner.resolve()?;
        self.weather.update(millis)?;

        let ambient = self.temperature;
        for device in self.devices.iter_mut() {
            let mut ctx = DeviceContext::new(&self.weather, ambient, &mut self.load);
            device.update(millis, &mut ctx)?;
        }

        self.last_balance = self.balance_energy(millis);
        self.weather.settle(&self.load, millis)?;
        self.apply_thermal_model(millis);

        let ts = self.owner.timestamp()?;
        for message in self.last_balance.metrics(ts) {
            self.owner.publish_energy(message)?;
        }
        self.load.reset();
        Ok(())
    }

    fn apply_thermal_model(&mut self, millis: u64) {
        let outside = self.weather.temperature();
        let hours = millis as f64 / 3_600_000.0;

        self.temperature += (outside - self.temperature) * (1.0 - self.insulation) * DIFFUSION_COEFFICIENT;
        self.temperature += self.load.heating_power / 1000.0 * hours * HEATING_GAIN;
        self.temperature -= self.load.cooling_power / 1000.0 * hours * COOLING_LOSS;
    }

    fn balance_energy(&mut self, millis: u64) -> EnergyBalance {
        let mut balance = EnergyBalance::default();
        for device in &self.devices {
            if let Some(source) = device.as_energy_source() {
                balance.production_kwh += source.calculate_production(&self.weather, millis);
            }
            if let Some(smart) = device.as_smart_device() {
                balance.consumption_kwh += smart.get_power_usage(millis);
            }
        }

        let mut remaining = balance.net_kwh();
        for device in self.devices.iter_mut().filter(|d| d.is_active()) {
            if remaining == 0.0 {
                break;
            }
            if let Some(storage) = device.as_any_mut().downcast_mut::<EnergyStorage>() {
                if remaining > 0.0 {
                    let stored = storage.charge_battery(remaining);
                    balance.stored_kwh += stored;
                    remaining -= stored;
                } else {
                    let released = storage.discharge_battery(-remaining);
                    balance.discharged_kwh += released;
                    remaining += released;
                }
            }
        }

        let grid = self
            .devices
            .iter_mut()
            .filter(|d| d.is_active())
            .find_map(|d| d.as_any_mut().downcast_mut::<ElectricGrid>());
        match grid {
            Some(grid) if remaining > 0.0 => balance.grid_export_kwh = grid.absorb(remaining),
            Some(grid) if remaining < 0.0 => balance.grid_import_kwh = grid.supply(-remaining),
            None if remaining > 0.0 => balance.curtailed_kwh = remaining,
            None if remaining < 0.0 => balance.unmet_kwh = -remaining,
            _ => {}
        }
        balance
    }
}
