use chrono::{DateTime, Utc};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::simulation::clock::DEFAULT_MILLIS_PER_TICK;
use crate::simulation::engine::DEFAULT_TOPIC_PREFIX;
use crate::simulation::environment::{DEFAULT_INSULATION, DEFAULT_TEMPERATURE};
use crate::weather::WeatherClass;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub simulation: SimulationConfig,
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    #[validate(nested)]
    pub environments: Vec<EnvironmentConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SimulationConfig {
    /// Simulated milliseconds per tick
    #[serde(default = "default_millis_per_tick")]
    #[validate(range(min = 1, max = 604_800_000))]
    pub base_millis_per_tick: u64,
    #[serde(default = "default_speed")]
    #[validate(range(min = 0.01, max = 100.0))]
    pub speed: f64,
    /// RFC 3339; defaults to the current time
    pub starting_timestamp: Option<DateTime<Utc>>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Log,
    Memory,
    Broadcast,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TelemetryConfig {
    #[serde(default = "default_topic_prefix")]
    #[validate(length(min = 1))]
    pub topic_prefix: String,
    #[serde(default)]
    pub sink: SinkKind,
    #[serde(default = "default_channel_capacity")]
    #[validate(range(min = 1))]
    pub channel_capacity: usize,
    /// Messages the memory sink keeps before dropping the oldest
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct EnvironmentConfig {
    pub name: String,
    #[serde(default = "default_weather")]
    pub weather: WeatherClass,
    #[serde(default = "default_temperature")]
    pub initial_temperature: f64,
    #[serde(default = "default_insulation")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub insulation: f64,
    #[serde(default)]
    #[validate(nested)]
    pub devices: Vec<DeviceConfig>,
}

/// One installed device; which optional fields apply depends on `kind`
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
pub struct DeviceConfig {
    /// Kebab-case class name, e.g. `photo-voltaic`
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[validate(range(min = 0.0))]
    pub price_per_kwh: Option<f64>,
    #[validate(range(min = 0.0))]
    pub capacity_kwh: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_charge_kw: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_discharge_kw: Option<f64>,
    #[validate(range(min = 0.0))]
    pub peak_power_watt: Option<f64>,
    #[validate(range(min = 0.0))]
    pub rated_power_watt: Option<f64>,
    #[validate(range(min = 0.0))]
    pub rated_speed: Option<f64>,
    #[validate(range(min = 0.0))]
    pub power_usage_watt: Option<f64>,
    pub target_temp: Option<f64>,
    pub brightness_threshold: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub level: Option<f64>,
}

fn default_millis_per_tick() -> u64 {
    DEFAULT_MILLIS_PER_TICK
}

fn default_speed() -> f64 {
    1.0
}

fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_history_limit() -> usize {
    crate::bus::sinks::DEFAULT_HISTORY_LIMIT
}

fn default_weather() -> WeatherClass {
    WeatherClass::Outdoor
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_insulation() -> f64 {
    DEFAULT_INSULATION
}

impl Config {
    /// `config/default.toml` overlaid with `BSIM__`-prefixed environment variables
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("BSIM__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;

    fn parse(toml: &str) -> Result<Config> {
        Config::from_figment(Figment::new().merge(Toml::string(toml)))
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = parse(
            r#"
            [simulation]
            [telemetry]
            "#,
        )
        .unwrap();
        assert_eq!(config.simulation.base_millis_per_tick, DEFAULT_MILLIS_PER_TICK);
        assert_eq!(config.simulation.speed, 1.0);
        assert_eq!(config.telemetry.topic_prefix, "bems");
        assert_eq!(config.telemetry.sink, SinkKind::Log);
        assert_eq!(config.telemetry.history_limit, crate::bus::sinks::DEFAULT_HISTORY_LIMIT);
        assert!(config.environments.is_empty());
    }

    #[test]
    fn test_environments_and_devices() {
        let config = parse(
            r#"
            [simulation]
            speed = 0.5
            seed = 7
            starting_timestamp = "2024-06-15T00:00:00Z"

            [telemetry]
            sink = "memory"

            [[environments]]
            name = "living-room"
            weather = "indoor"
            insulation = 0.9

            [[environments.devices]]
            kind = "heating"
            name = "heater-1"
            enabled = true
            power_usage_watt = 1500.0
            "#,
        )
        .unwrap();

        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.telemetry.sink, SinkKind::Memory);
        let env = &config.environments[0];
        assert_eq!(env.weather, WeatherClass::Indoor);
        assert_eq!(env.initial_temperature, DEFAULT_TEMPERATURE);
        assert_eq!(env.devices[0].kind, "heating");
        assert!(env.devices[0].enabled);
    }

    #[test]
    fn test_out_of_range_speed_rejected() {
        let err = parse(
            r#"
            [simulation]
            speed = 500.0
            [telemetry]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn test_device_level_range_checked() {
        let err = parse(
            r#"
            [simulation]
            [telemetry]
            [[environments]]
            name = "shed"
            [[environments.devices]]
            kind = "lighting"
            name = "lamp"
            power_usage_watt = 40.0
            level = 1.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }
}
