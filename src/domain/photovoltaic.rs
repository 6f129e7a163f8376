use std::any::Any;

use super::energy_source::watt_to_kwh;
use super::{Device, DeviceClass, DeviceContext, DeviceCore, EnergySource};
use crate::bus::TelemetryMessage;
use crate::error::{Result, SimError};
use crate::simulation::EnvironmentRef;
use crate::weather::Weather;

/// Solar panels producing in proportion to ambient brightness
#[derive(Debug)]
pub struct PhotoVoltaic {
    core: DeviceCore,
    pub peak_power_watt: f64,
    last_production_kwh: f64,
    total_production_kwh: f64,
}

impl PhotoVoltaic {
    pub fn new(name: &str, owner: EnvironmentRef, peak_power_watt: f64) -> Result<Self> {
        if !peak_power_watt.is_finite() || peak_power_watt < 0.0 {
            return Err(SimError::validation(format!(
                "peak power must be non-negative, got {peak_power_watt}"
            )));
        }
        Ok(Self {
            core: DeviceCore::new(name, owner)?,
            peak_power_watt,
            last_production_kwh: 0.0,
            total_production_kwh: 0.0,
        })
    }

    pub fn last_production_kwh(&self) -> f64 {
        self.last_production_kwh
    }

    pub fn total_production_kwh(&self) -> f64 {
        self.total_production_kwh
    }
}

impl Device for PhotoVoltaic {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::PhotoVoltaic
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

impl EnergySource for PhotoVoltaic {
    fn calculate_production(&self, weather: &Weather, millis_passed: u64) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        watt_to_kwh(self.peak_power_watt * weather.brightness(), millis_passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::testing::owner_at;
    use crate::weather::{WeatherClass, WeatherState};

    fn full_sun(owner: EnvironmentRef) -> Weather {
        let mut weather = Weather::for_class(WeatherClass::Outdoor, owner, Some(1)).unwrap();
        weather.set_state(WeatherState {
            sunlight: 1.0,
            brightness: 1.0,
            cloud_cover: 0.0,
            wind: 0.0,
            temperature: 20.0,
            rainfall: 0.0,
        });
        weather
    }

    #[test]
    fn test_pv_produces_peak_in_full_sun() {
        let (_ctx, owner, _sink) = owner_at(12);
        let mut pv = PhotoVoltaic::new("pv1", owner.clone(), 5000.0).unwrap();
        let weather = full_sun(owner);

        assert_eq!(pv.calculate_production(&weather, 3_600_000), 0.0);

        pv.enable().unwrap();
        let produced = pv.calculate_production(&weather, 3_600_000);
        assert!((produced - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_pv_update_tracks_totals() {
        let (_ctx, owner, sink) = owner_at(12);
        let mut pv = PhotoVoltaic::new("pv-roof", owner.clone(), 2000.0).unwrap();
        pv.enable().unwrap();
        let weather = full_sun(owner);
        let mut load = crate::simulation::ThermalLoad::default();

        for _ in 0..4 {
            let mut ctx = DeviceContext::new(&weather, 21.0, &mut load);
            pv.update(900_000, &mut ctx).unwrap();
        }
        assert!((pv.last_production_kwh() - 0.5).abs() < 1e-9);
        assert!((pv.total_production_kwh() - 2.0).abs() < 1e-9);
        assert_eq!(sink.count_suffix("/production"), 4);
    }
}
