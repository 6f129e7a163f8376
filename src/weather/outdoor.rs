use rand::Rng;
use std::f64::consts::PI;

use super::{
    Climate, ClimateModel, WeatherClass, WeatherState, CLOUD_DAMPENING, RAIN_CLOUD_THRESHOLD,
    RAIN_PROBABILITY,
};
use crate::simulation::ThermalLoad;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Open-air weather with a diurnal temperature cycle
#[derive(Debug, Clone)]
pub struct OutdoorWeather {
    /// Mean daily temperature, °C
    pub mean_temp_c: f64,
    /// Half the day/night swing, °C
    pub diurnal_amplitude_c: f64,
    /// Max random temperature noise per update, °C
    pub temp_noise_c: f64,
    pub cloud_step_per_minute: f64,
    pub cloud_trend_limit: f64,
    pub wind_step_per_minute: f64,
    pub wind_trend_limit: f64,
}

impl Default for OutdoorWeather {
    fn default() -> Self {
        Self {
            mean_temp_c: 12.0,
            diurnal_amplitude_c: 8.0,
            temp_noise_c: 0.3,
            cloud_step_per_minute: 0.5,
            cloud_trend_limit: 2.0,
            wind_step_per_minute: 0.05,
            wind_trend_limit: 0.1,
        }
    }
}

impl ClimateModel for OutdoorWeather {
    fn class(&self) -> WeatherClass {
        WeatherClass::Outdoor
    }

    fn initial_state(&self) -> WeatherState {
        WeatherState {
            sunlight: 0.0,
            brightness: 0.0,
            cloud_cover: 30.0,
            wind: 2.0,
            temperature: 15.0,
            rainfall: 0.0,
        }
    }

    fn brightness_unit(&self) -> &'static str {
        ""
    }

    fn update_sunlight(&self, climate: &mut Climate, hour: f64) {
        let s = &mut climate.state;
        s.sunlight = Climate::daylight(hour);
        s.brightness = s.sunlight * (1.0 - s.cloud_cover / 100.0 * CLOUD_DAMPENING);
    }

    fn update_cloud_cover(&self, climate: &mut Climate, millis: u64) {
        let minutes = millis as f64 / MILLIS_PER_MINUTE;
        let trend = Climate::drift(
            &mut climate.rng,
            &mut climate.cloud_trend,
            self.cloud_step_per_minute,
            self.cloud_trend_limit,
            minutes,
        );
        climate.state.cloud_cover = (climate.state.cloud_cover + trend).clamp(0.0, 100.0);
    }

    fn update_rainfall(&self, climate: &mut Climate, _millis: u64) {
        if climate.state.cloud_cover > RAIN_CLOUD_THRESHOLD {
            if climate.rng.gen::<f64>() < RAIN_PROBABILITY {
                climate.state.rainfall = climate.rng.gen_range(0.5..=5.0);
            }
        } else {
            climate.state.rainfall = 0.0;
        }
    }

    fn update_wind(&self, climate: &mut Climate, millis: u64) {
        let minutes = millis as f64 / MILLIS_PER_MINUTE;
        let trend = Climate::drift(
            &mut climate.rng,
            &mut climate.wind_trend,
            self.wind_step_per_minute,
            self.wind_trend_limit,
            minutes,
        );
        climate.state.wind = (climate.state.wind + trend).max(0.0);
    }

    fn update_temperature(&self, climate: &mut Climate, hour: f64, _millis: u64) {
        let day_cycle = ((hour - 5.0) / 24.0 * 2.0 * PI).sin();
        let base = self.mean_temp_c + self.diurnal_amplitude_c * day_cycle;
        let noise = climate.rng.gen_range(-self.temp_noise_c..=self.temp_noise_c);
        climate.state.temperature = base + climate.temp_offset + noise;
    }

    fn absorb(&self, _climate: &mut Climate, _load: &ThermalLoad, _millis: u64) {}
}
