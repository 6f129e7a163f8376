use super::{Climate, ClimateModel, WeatherClass, WeatherState, CLOUD_DAMPENING};
use crate::simulation::ThermalLoad;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Climate inside a building zone
#[derive(Debug, Clone)]
pub struct IndoorWeather {
    /// 0.0-1.0
    pub insulation: f64,
    /// Temperature rise per kWh of net heating
    pub celsius_per_kwh: f64,
    /// Passive loss rate, °C per hour at full insulation factor
    pub chill_rate_c_per_hour: f64,
    /// Share of outdoor daylight reaching the room
    pub window_factor: f64,
    /// Daylight lumens at full sun
    pub daylight_lumens: f64,
}

impl Default for IndoorWeather {
    fn default() -> Self {
        Self {
            insulation: 0.80,
            celsius_per_kwh: 0.35,
            chill_rate_c_per_hour: 0.5,
            window_factor: 0.5,
            daylight_lumens: 25_000.0,
        }
    }
}

impl ClimateModel for IndoorWeather {
    fn class(&self) -> WeatherClass {
        WeatherClass::Indoor
    }

    fn initial_state(&self) -> WeatherState {
        WeatherState {
            sunlight: 0.0,
            brightness: 0.0,
            cloud_cover: 100.0,
            wind: 0.0,
            temperature: 22.0,
            rainfall: 0.0,
        }
    }

    fn brightness_unit(&self) -> &'static str {
        "lumen"
    }

    fn update_sunlight(&self, climate: &mut Climate, hour: f64) {
        let s = &mut climate.state;
        s.sunlight = Climate::daylight(hour);
        s.brightness = s.sunlight
            * (1.0 - s.cloud_cover / 100.0 * CLOUD_DAMPENING)
            * self.window_factor
            * self.daylight_lumens;
    }

    // Indoors there is no sky, wind or rain.
    fn update_cloud_cover(&self, _climate: &mut Climate, _millis: u64) {}

    fn update_rainfall(&self, _climate: &mut Climate, _millis: u64) {}

    fn update_wind(&self, _climate: &mut Climate, _millis: u64) {}

    fn update_temperature(&self, climate: &mut Climate, _hour: f64, millis: u64) {
        let hours = millis as f64 / MILLIS_PER_HOUR;
        climate.state.temperature -= self.chill_rate_c_per_hour * self.insulation * hours;
    }

    fn absorb(&self, climate: &mut Climate, load: &ThermalLoad, millis: u64) {
        let hours = millis as f64 / MILLIS_PER_HOUR;
        let net_kwh = load.net_heating_watt() / 1000.0 * hours;
        climate.state.temperature += net_kwh * self.celsius_per_kwh;
        climate.state.brightness += load.lighting_lumens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn climate() -> Climate {
        Climate::new(IndoorWeather::default().initial_state(), Some(11))
    }

    #[test]
    fn test_passive_loss_without_heating() {
        let model = IndoorWeather::default();
        let mut c = climate();
        model.update_temperature(&mut c, 12.0, 3_600_000);
        assert!((c.state.temperature - (22.0 - 0.4)).abs() < 1e-9);
    }

    #[test]
    fn test_heating_converted_per_kwh() {
        let model = IndoorWeather::default();
        let mut c = climate();
        let load = ThermalLoad {
            heating_power: 2000.0,
            ..Default::default()
        };
        model.absorb(&mut c, &load, 3_600_000);
        assert!((c.state.temperature - (22.0 + 0.7)).abs() < 1e-9);
    }

    #[test]
    fn test_artificial_light_adds_to_brightness() {
        let model = IndoorWeather::default();
        let mut c = climate();
        model.update_sunlight(&mut c, 0.0);
        assert_eq!(c.state.brightness, 0.0);

        let load = ThermalLoad {
            lighting_lumens: 600.0,
            ..Default::default()
        };
        model.absorb(&mut c, &load, 60_000);
        assert_eq!(c.state.brightness, 600.0);
    }

    #[test]
    fn test_no_wind_or_rain_indoors() {
        let model = IndoorWeather::default();
        let mut c = climate();
        model.update_wind(&mut c, 3_600_000);
        model.update_rainfall(&mut c, 3_600_000);
        model.update_cloud_cover(&mut c, 3_600_000);
        assert_eq!(c.state.wind, 0.0);
        assert_eq!(c.state.rainfall, 0.0);
        assert_eq!(c.state.cloud_cover, 100.0);
    }
}
