use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::{
    AirConditioning, Device, ElectricGrid, EnergyStorage, Heating, Lighting, PhotoVoltaic, WindTurbine,
    DEFAULT_BRIGHTNESS_THRESHOLD, DEFAULT_COOLING_TARGET, DEFAULT_HEATING_TARGET, DEFAULT_PRICE_PER_KWH,
    DEFAULT_RATED_SPEED,
};
use crate::config::DeviceConfig;
use crate::error::{Result, SimError};
use crate::simulation::EnvironmentRef;

/// Every class of the device hierarchy, abstract roots included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    Device,
    EnergySource,
    SmartDevice,
    ElectricGrid,
    EnergyStorage,
    PhotoVoltaic,
    WindTurbine,
    Heating,
    AirConditioning,
    Lighting,
}

impl DeviceClass {
    pub fn parse(kind: &str) -> Result<Self> {
        Self::from_str(kind).map_err(|_| {
            let known: Vec<String> = Self::iter().map(|c| c.to_string()).collect();
            SimError::validation(format!("unknown device kind '{kind}', expected one of {}", known.join(", ")))
        })
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, DeviceClass::Device | DeviceClass::EnergySource | DeviceClass::SmartDevice)
    }

    pub fn is_energy_source(&self) -> bool {
        matches!(
            self,
            DeviceClass::ElectricGrid | DeviceClass::EnergyStorage | DeviceClass::PhotoVoltaic | DeviceClass::WindTurbine
        )
    }
}

/// Builds concrete devices from configuration entries
pub struct DeviceFactory;

impl DeviceFactory {
    pub fn build(owner: EnvironmentRef, config: &DeviceConfig) -> Result<Box<dyn Device>> {
        let class = DeviceClass::parse(&config.kind)?;
        if class.is_abstract() {
            return Err(SimError::AbstractInstantiation(class.to_string()));
        }

        let name = config.name.as_str();
        let mut device: Box<dyn Device> = match class {
            DeviceClass::ElectricGrid => Box::new(ElectricGrid::named(
                name,
                owner,
                config.price_per_kwh.unwrap_or(DEFAULT_PRICE_PER_KWH),
            )?),
            DeviceClass::EnergyStorage => Box::new(EnergyStorage::new(
                name,
                owner,
                required(config.capacity_kwh, "capacity_kwh", name)?,
                required(config.max_charge_kw, "max_charge_kw", name)?,
                required(config.max_discharge_kw, "max_discharge_kw", name)?,
            )?),
            DeviceClass::PhotoVoltaic => Box::new(PhotoVoltaic::new(
                name,
                owner,
                required(config.peak_power_watt, "peak_power_watt", name)?,
            )?),
            DeviceClass::WindTurbine => Box::new(WindTurbine::new(
                name,
                owner,
                required(config.rated_power_watt, "rated_power_watt", name)?,
                config.rated_speed.unwrap_or(DEFAULT_RATED_SPEED),
            )?),
            DeviceClass::Heating => Box::new(Heating::new(
                name,
                owner,
                required(config.power_usage_watt, "power_usage_watt", name)?,
                config.target_temp.unwrap_or(DEFAULT_HEATING_TARGET),
            )?),
            DeviceClass::AirConditioning => Box::new(AirConditioning::new(
                name,
                owner,
                required(config.power_usage_watt, "power_usage_watt", name)?,
                config.target_temp.unwrap_or(DEFAULT_COOLING_TARGET),
            )?),
            DeviceClass::Lighting => Box::new(Lighting::new(
                name,
                owner,
                required(config.power_usage_watt, "power_usage_watt", name)?,
                config.brightness_threshold.unwrap_or(DEFAULT_BRIGHTNESS_THRESHOLD),
            )?),
            DeviceClass::Device | DeviceClass::EnergySource | DeviceClass::SmartDevice => {
                return Err(SimError::AbstractInstantiation(class.to_string()))
            }
        };

        if let Some(level) = config.level {
            match device.as_smart_device_mut() {
                Some(smart) => smart.set_level(level)?,
                None => tracing::warn!(device = name, kind = %class, "level ignored for energy source"),
            }
        }
        if config.enabled {
            device.enable()?;
        }

        tracing::debug!(device = name, kind = %class, id = %device.id(), "device created");
        Ok(device)
    }
}

fn required(value: Option<f64>, field: &str, device: &str) -> Result<f64> {
    value.ok_or_else(|| SimError::validation(format!("device {device} is missing {field}")))
}
