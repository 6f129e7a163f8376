//! # Weather Simulation
//!
//! Per-environment microclimate. Each tick a [`Weather`] independently
//! refreshes sunlight, cloud cover, rainfall, wind and temperature through
//! its [`ClimateModel`], then (after the environment's devices ran) absorbs
//! the tick's [`ThermalLoad`] and publishes every metric once.
//!
//! Two variants exist:
//! - [`OutdoorWeather`]: diurnal temperature cycle, random-walk clouds and wind,
//!   stochastic rain
//! - [`IndoorWeather`]: no diurnal term; temperature follows passive heat loss
//!   and active heating, brightness includes artificial lighting

pub mod indoor;
pub mod outdoor;

pub use indoor::IndoorWeather;
pub use outdoor::OutdoorWeather;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use strum::{Display, EnumString};

use crate::bus::TelemetryMessage;
use crate::error::{Result, SimError};
use crate::simulation::{EnvironmentRef, ThermalLoad};

/// Share of sunlight blocked by a fully overcast sky
pub const CLOUD_DAMPENING: f64 = 0.6;
/// Cloud cover (percent) above which rain may start
pub const RAIN_CLOUD_THRESHOLD: f64 = 60.0;
/// Chance per tick that rain starts under heavy clouds
pub const RAIN_PROBABILITY: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WeatherClass {
    /// Abstract root, cannot be instantiated
    Weather,
    Outdoor,
    Indoor,
}

impl WeatherClass {
    pub fn is_abstract(&self) -> bool {
        matches!(self, WeatherClass::Weather)
    }
}

/// Observable weather readings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherState {
    /// 0.0-1.0
    pub sunlight: f64,
    pub brightness: f64,
    /// Percent, 0-100
    pub cloud_cover: f64,
    /// m/s
    pub wind: f64,
    /// °C
    pub temperature: f64,
    /// mm/h
    pub rainfall: f64,
}

/// Mutable climate data handed to a [`ClimateModel`]
#[derive(Debug)]
pub struct Climate {
    pub state: WeatherState,
    /// Fixed per-instance bias added to the outdoor temperature
    pub temp_offset: f64,
    pub wind_trend: f64,
    pub cloud_trend: f64,
    rng: StdRng,
}

impl Climate {
    fn new(state: WeatherState, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let temp_offset = rng.gen_range(-3.0..=3.0);
        let wind_trend = rng.gen_range(-0.05..=0.05);
        let cloud_trend = rng.gen_range(-0.5..=0.5);

        Self {
            state,
            temp_offset,
            wind_trend,
            cloud_trend,
            rng,
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Sunlight from time of day; brightness before cloud and artificial light
    pub fn daylight(hour: f64) -> f64 {
        ((hour - 6.0) / 12.0 * PI).sin().clamp(0.0, 1.0)
    }

    /// Advance a random-walk trend by `minutes` and return it
    pub fn drift(rng: &mut StdRng, trend: &mut f64, step_per_minute: f64, limit: f64, minutes: f64) -> f64 {
        *trend += rng.gen_range(-step_per_minute..=step_per_minute) * minutes;
        *trend = trend.clamp(-limit, limit);
        *trend
    }
}

/// Per-variant weather physics
pub trait ClimateModel: Send + std::fmt::Debug {
    fn class(&self) -> WeatherClass;

    fn initial_state(&self) -> WeatherState;

    fn brightness_unit(&self) -> &'static str;

    fn update_sunlight(&self, climate: &mut Climate, hour: f64);

    fn update_cloud_cover(&self, climate: &mut Climate, millis: u64);

    fn update_rainfall(&self, climate: &mut Climate, millis: u64);

    fn update_wind(&self, climate: &mut Climate, millis: u64);

    fn update_temperature(&self, climate: &mut Climate, hour: f64, millis: u64);

    /// Fold device contributions of the finished tick into the readings
    fn absorb(&self, climate: &mut Climate, load: &ThermalLoad, millis: u64);
}

#[derive(Debug)]
pub struct Weather {
    climate: Climate,
    model: Box<dyn ClimateModel>,
    owner: EnvironmentRef,
}

impl Weather {
    pub fn new(model: Box<dyn ClimateModel>, owner: EnvironmentRef, seed: Option<u64>) -> Self {
        let climate = Climate::new(model.initial_state(), seed);
        Self {
            climate,
            model,
            owner,
        }
    }

    pub fn for_class(class: WeatherClass, owner: EnvironmentRef, seed: Option<u64>) -> Result<Self> {
        let model: Box<dyn ClimateModel> = match class {
            WeatherClass::Weather => {
                return Err(SimError::AbstractInstantiation(format!(
                    "{class} is abstract, choose outdoor or indoor"
                )))
            }
            WeatherClass::Outdoor => Box::new(OutdoorWeather::default()),
            WeatherClass::Indoor => Box::new(IndoorWeather::default()),
        };
        Ok(Self::new(model, owner, seed))
    }

    pub fn class(&self) -> WeatherClass {
        self.model.class()
    }

    pub fn owner(&self) -> &EnvironmentRef {
        &self.owner
    }

    pub fn state(&self) -> &WeatherState {
        &self.climate.state
    }

    pub fn temperature(&self) -> f64 {
        self.climate.state.temperature
    }

    pub fn sunlight(&self) -> f64 {
        self.climate.state.sunlight
    }

    pub fn brightness(&self) -> f64 {
        self.climate.state.brightness
    }

    pub fn cloud_cover(&self) -> f64 {
        self.climate.state.cloud_cover
    }

    pub fn rainfall(&self) -> f64 {
        self.climate.state.rainfall
    }

    pub fn wind_speed(&self) -> f64 {
        self.climate.state.wind
    }

    pub fn temp_offset(&self) -> f64 {
        self.climate.temp_offset
    }

    pub fn wind_trend(&self) -> f64 {
        self.climate.wind_trend
    }

    /// Overwrite readings, used to pin conditions in scenarios
    pub fn set_state(&mut self, state: WeatherState) {
        self.climate.state = state;
    }

    /// Refresh every metric for `millis` of simulated time
    pub fn update(&mut self, millis: u64) -> Result<()> {
        let hour = self.owner.hour_of_day()?;

        self.model.update_sunlight(&mut self.climate, hour);
        self.model.update_cloud_cover(&mut self.climate, millis);
        self.model.update_rainfall(&mut self.climate, millis);
        self.model.update_wind(&mut self.climate, millis);
        self.model.update_temperature(&mut self.climate, hour, millis);
        Ok(())
    }

    /// Absorb the tick's device contributions and publish the readings
    pub fn settle(&mut self, load: &ThermalLoad, millis: u64) -> Result<()> {
        self.model.absorb(&mut self.climate, load, millis);
        self.publish()
    }

    fn publish(&self) -> Result<()> {
        let ts = self.owner.timestamp()?;
        let s = &self.climate.state;
        let metrics = [
            TelemetryMessage::new("temperature", s.temperature, "C", ts),
            TelemetryMessage::new("sunlight", s.sunlight, "", ts),
            TelemetryMessage::new("brightness", s.brightness, self.model.brightness_unit(), ts),
            TelemetryMessage::new("cloud_cover", s.cloud_cover, "percent", ts),
            TelemetryMessage::new("rainfall", s.rainfall, "mm/h", ts),
            TelemetryMessage::new("wind", s.wind, "m/s", ts),
        ];
        for message in metrics {
            self.owner.publish_weather(message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::testing::owner_at;

    #[test]
    fn test_abstract_weather_is_rejected() {
        let (_ctx, owner, _sink) = owner_at(12);
        let result = Weather::for_class(WeatherClass::Weather, owner, Some(1));
        assert!(matches!(result, Err(SimError::AbstractInstantiation(_))));
    }

    #[test]
    fn test_daylight_curve() {
        assert_eq!(Climate::daylight(0.0), 0.0);
        assert_eq!(Climate::daylight(6.0), 0.0);
        assert!((Climate::daylight(12.0) - 1.0).abs() < 1e-9);
        assert_eq!(Climate::daylight(20.0), 0.0);
    }

    #[test]
    fn test_drift_is_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut trend = 0.0;
        for _ in 0..500 {
            let t = Climate::drift(&mut rng, &mut trend, 0.05, 0.1, 15.0);
            assert!((-0.1..=0.1).contains(&t));
        }
    }

    #[test]
    fn test_seed_reproduces_bias() {
        let (_ctx, owner, _sink) = owner_at(12);
        let a = Weather::for_class(WeatherClass::Outdoor, owner.clone(), Some(42)).unwrap();
        let b = Weather::for_class(WeatherClass::Outdoor, owner, Some(42)).unwrap();
        assert_eq!(a.temp_offset(), b.temp_offset());
        assert_eq!(a.wind_trend(), b.wind_trend());
        assert!((-3.0..=3.0).contains(&a.temp_offset()));
    }

    #[test]
    fn test_settle_publishes_each_metric_once() {
        let (_ctx, owner, sink) = owner_at(12);
        let mut weather = Weather::for_class(WeatherClass::Outdoor, owner, Some(3)).unwrap();
        weather.update(900_000).unwrap();
        weather.settle(&ThermalLoad::default(), 900_000).unwrap();

        assert_eq!(sink.history().len(), 6);
        assert_eq!(sink.count_suffix("/weather/temperature"), 1);
    }

    #[test]
    fn test_update_fails_when_owner_gone() {
        let (ctx, owner, _sink) = owner_at(12);
        let mut weather = Weather::for_class(WeatherClass::Indoor, owner, Some(3)).unwrap();
        drop(ctx);
        assert_eq!(weather.update(1000), Err(SimError::OwnerGone("simulation")));
    }
}
