use std::any::Any;

use super::{Device, DeviceClass, DeviceContext, DeviceCore, EnergySource};
use crate::bus::TelemetryMessage;
use crate::error::{Result, SimError};
use crate::simulation::EnvironmentRef;
use crate::weather::Weather;

/// Battery bank; stores energy but never generates it
#[derive(Debug)]
pub struct EnergyStorage {
    core: DeviceCore,
    capacity_kwh: f64,
    charge_kwh: f64,
    /// Max energy accepted per charge call, kWh
    max_charge: f64,
    /// Max energy released per discharge call, kWh
    max_discharge: f64,
}

impl EnergyStorage {
    pub fn new(
        name: &str,
        owner: EnvironmentRef,
        capacity_kwh: f64,
        max_charge: f64,
        max_discharge: f64,
    ) -> Result<Self> {
        for (label, value) in [
            ("capacity", capacity_kwh),
            ("max charge", max_charge),
            ("max discharge", max_discharge),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::validation(format!(
                    "{label} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(Self {
            core: DeviceCore::new(name, owner)?,
            capacity_kwh,
            charge_kwh: 0.0,
            max_charge,
            max_discharge,
        })
    }

    pub fn capacity_kwh(&self) -> f64 {
        self.capacity_kwh
    }

    pub fn charge_kwh(&self) -> f64 {
        self.charge_kwh
    }

    pub fn set_charge(&mut self, charge_kwh: f64) -> Result<()> {
        if !(0.0..=self.capacity_kwh).contains(&charge_kwh) {
            return Err(SimError::validation(format!(
                "charge must be between 0 and {} kWh, got {charge_kwh}",
                self.capacity_kwh
            )));
        }
        self.charge_kwh = charge_kwh;
        Ok(())
    }

    /// State of charge in percent
    pub fn soc_percent(&self) -> f64 {
        if self.capacity_kwh <= 0.0 {
            return 0.0;
        }
        self.charge_kwh / self.capacity_kwh * 100.0
    }

    /// Store up to `energy_kwh`, returning what was accepted
    pub fn charge_battery(&mut self, energy_kwh: f64) -> f64 {
        let accepted = (self.capacity_kwh - self.charge_kwh)
            .min(self.max_charge)
            .min(energy_kwh)
            .max(0.0);
        self.charge_kwh += accepted;
        accepted
    }

    /// Release up to `needed_kwh`, returning what was provided
    pub fn discharge_battery(&mut self, needed_kwh: f64) -> f64 {
        let provided = self
            .charge_kwh
            .min(self.max_discharge)
            .min(needed_kwh)
            .max(0.0);
        self.charge_kwh -= provided;
        provided
    }
}

impl Device for EnergyStorage {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::EnergyStorage
    }

    fn update(&mut self, _millis_passed: u64, _ctx: &mut DeviceContext<'_>) -> Result<()> {
        let ts = self.core.timestamp()?;
        self.core.publish_active(ts)?;
        self.core.publish(TelemetryMessage::new("charge", self.charge_kwh, "kWh", ts))?;
        self.core.publish(TelemetryMessage::new("soc", self.soc_percent(), "percent", ts))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_energy_source(&self) -> Option<&dyn EnergySource> {
        Some(self)
    }
}

impl EnergySource for EnergyStorage {
    fn calculate_production(&self, _weather: &Weather, _millis_passed: u64) -> f64 {
        0.0
    }
}
