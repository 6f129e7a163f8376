use std::any::Any;

use super::{Device, DeviceClass, DeviceContext, DeviceCore, EnergySource};
use crate::bus::TelemetryMessage;
use crate::error::{Result, SimError};
use crate::simulation::EnvironmentRef;
use crate::weather::Weather;

pub const DEFAULT_PRICE_PER_KWH: f64 = 0.8;

/// Utility connection modelled as an infinite source and sink
#[derive(Debug)]
pub struct ElectricGrid {
    core: DeviceCore,
    pub price_per_kwh: f64,
    total_imported_kwh: f64,
    total_exported_kwh: f64,
    tick_imported_kwh: f64,
}

impl ElectricGrid {
    pub const DEFAULT_NAME: &'static str = "electric-grid";

    pub fn new(owner: EnvironmentRef, price_per_kwh: f64) -> Result<Self> {
        Self::named(Self::DEFAULT_NAME, owner, price_per_kwh)
    }

    pub fn named(name: &str, owner: EnvironmentRef, price_per_kwh: f64) -> Result<Self> {
        if !price_per_kwh.is_finite() || price_per_kwh < 0.0 {
            return Err(SimError::validation(format!(
                "price per kWh must be non-negative, got {price_per_kwh}"
            )));
        }
        Ok(Self {
            core: DeviceCore::new(name, owner)?,
            price_per_kwh,
            total_imported_kwh: 0.0,
            total_exported_kwh: 0.0,
            tick_imported_kwh: 0.0,
        })
    }

    /// Deliver `needed_kwh`; the grid never runs short
    pub fn supply(&mut self, needed_kwh: f64) -> f64 {
        self.total_imported_kwh += needed_kwh;
        self.tick_imported_kwh += needed_kwh;
        needed_kwh
    }

    /// Take surplus energy; the grid accepts any amount
    pub fn absorb(&mut self, surplus_kwh: f64) -> f64 {
        self.total_exported_kwh += surplus_kwh;
        surplus_kwh
    }

    pub fn cost(&self, kwh: f64) -> f64 {
        kwh * self.price_per_kwh
    }

    pub fn total_imported_kwh(&self) -> f64 {
        self.total_imported_kwh
    }

    pub fn total_exported_kwh(&self) -> f64 {
        self.total_exported_kwh
    }
}

impl Device for ElectricGrid {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::ElectricGrid
    }

    fn update(&mut self, _millis_passed: u64, _ctx: &mut DeviceContext<'_>) -> Result<()> {
        let ts = self.core.timestamp()?;
        self.core.publish_active(ts)?;
        // Imports of the previous tick's balance
        self.core.publish(TelemetryMessage::new("supplied", self.tick_imported_kwh, "kWh", ts))?;
        self.tick_imported_kwh = 0.0;
        Ok(())
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

impl EnergySource for ElectricGrid {
    fn calculate_production(&self, _weather: &Weather, _millis_passed: u64) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::testing::owner_at;

    #[test]
    fn test_grid_supplies_whatever_is_needed() {
        let (_ctx, owner, _sink) = owner_at(0);
        let mut grid = ElectricGrid::new(owner, DEFAULT_PRICE_PER_KWH).unwrap();

        assert_eq!(grid.supply(5.0), 5.0);
        assert_eq!(grid.supply(0.5), 0.5);
        assert!((grid.total_imported_kwh() - 5.5).abs() < 1e-12);
        assert!((grid.cost(10.0) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_grid_produces_nothing() {
        let (_ctx, owner, _sink) = owner_at(12);
        let grid = ElectricGrid::new(owner.clone(), 0.5).unwrap();
        let weather = Weather::for_class(crate::weather::WeatherClass::Outdoor, owner, Some(1)).unwrap();
        assert_eq!(grid.calculate_production(&weather, 3_600_000), 0.0);
        assert_eq!(grid.name(), "electric-grid");
    }
}
