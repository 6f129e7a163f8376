use std::any::Any;

use super::energy_source::watt_to_kwh;
use super::{Device, DeviceClass, DeviceContext, DeviceCore, EnergySource};
use crate::bus::TelemetryMessage;
use crate::error::{Result, SimError};
use crate::simulation::EnvironmentRef;
use crate::weather::Weather;

pub const DEFAULT_RATED_SPEED: f64 = 12.0;

#[derive(Debug)]
pub struct WindTurbine {
    core: DeviceCore,
    pub rated_power_watt: f64,
    /// Wind speed at which rated power is reached, m/s
    pub rated_speed: f64,
    last_production_kwh: f64,
    total_production_kwh: f64,
}

impl WindTurbine {
    pub fn new(name: &str, owner: EnvironmentRef, rated_power_watt: f64, rated_speed: f64) -> Result<Self> {
        if !rated_power_watt.is_finite() || rated_power_watt < 0.0 {
            return Err(SimError::validation(format!(
                "rated power must be non-negative, got {rated_power_watt}"
            )));
        }
        if !rated_speed.is_finite() || rated_speed <= 0.0 {
            return Err(SimError::validation(format!(
                "rated speed must be positive, got {rated_speed}"
            )));
        }
        Ok(Self {
            core: DeviceCore::new(name, owner)?,
            rated_power_watt,
            rated_speed,
            last_production_kwh: 0.0,
            total_production_kwh: 0.0,
        })
    }

    /// Instantaneous output at `wind` m/s, W
    pub fn power_at(&self, wind: f64) -> f64 {
        if wind <= 0.0 {
            0.0
        } else if wind > self.rated_speed {
            self.rated_power_watt
        } else {
            self.rated_power_watt * (wind / self.rated_speed)
        }
    }

    pub fn last_production_kwh(&self) -> f64 {
        self.last_production_kwh
    }

    pub fn total_production_kwh(&self) -> f64 {
        self.total_production_kwh
    }
}

impl Device for WindTurbine {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::WindTurbine
    }

    fn update(&mut self, millis_passed: u64, ctx: &mut DeviceContext<'_>) -> Result<()> {
        let produced = self.calculate_production(ctx.weather(), millis_passed);
        self.last_production_kwh = produced;
        self.total_production_kwh += produced;

        let ts = self.core.timestamp()?;
        self.core.publish_active(ts)?;
        self.core.publish(TelemetryMessage::new("production", produced, "kWh", ts))
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

impl EnergySource for WindTurbine {
    fn calculate_production(&self, weather: &Weather, millis_passed: u64) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        watt_to_kwh(self.power_at(weather.wind_speed()), millis_passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::testing::owner_at;
    use crate::weather::{WeatherClass, WeatherState};
    use rstest::rstest;

    #[rstest]
    #[case(12.0, 3.0)]
    #[case(6.0, 1.5)]
    #[case(0.0, 0.0)]
    #[case(20.0, 3.0)]
    fn test_turbine_production(#[case] wind: f64, #[case] expected_kwh: f64) {
        let (_ctx, owner, _sink) = owner_at(12);
        let mut turbine = WindTurbine::new("turbine", owner.clone(), 3000.0, DEFAULT_RATED_SPEED).unwrap();
        turbine.enable().unwrap();

        let mut weather = Weather::for_class(WeatherClass::Outdoor, owner, Some(1)).unwrap();
        weather.set_state(WeatherState {
            sunlight: 0.0,
            brightness: 0.0,
            cloud_cover: 50.0,
            wind,
            temperature: 10.0,
            rainfall: 0.0,
        });

        let produced = turbine.calculate_production(&weather, 3_600_000);
        assert!((produced - expected_kwh).abs() < 1e-9, "wind {wind}: {produced}");
    }

    #[test]
    fn test_disabled_turbine_is_idle() {
        let (_ctx, owner, _sink) = owner_at(12);
        let turbine = WindTurbine::new("turbine", owner.clone(), 3000.0, 12.0).unwrap();
        let weather = Weather::for_class(WeatherClass::Outdoor, owner, Some(1)).unwrap();
        assert_eq!(turbine.calculate_production(&weather, 3_600_000), 0.0);
    }

    #[test]
    fn test_zero_rated_speed_rejected() {
        let (_ctx, owner, _sink) = owner_at(12);
        assert!(WindTurbine::new("turbine", owner, 3000.0, 0.0).is_err());
    }
}
