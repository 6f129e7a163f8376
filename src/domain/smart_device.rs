use serde::{Deserialize, Serialize};

use super::energy_source::watt_to_kwh;
use super::Device;
use crate::bus::TelemetryMessage;
use crate::error::{Result, SimError};

/// Consumption parameters shared by smart devices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartCore {
    pub power_usage_watt: f64,
    /// Duty level, 0.0-1.0
    level: f64,
}

impl SmartCore {
    pub fn new(power_usage_watt: f64) -> Result<Self> {
        if !power_usage_watt.is_finite() || power_usage_watt < 0.0 {
            return Err(SimError::validation(format!(
                "power usage must be a non-negative number of watts, got {power_usage_watt}"
            )));
        }
        Ok(Self {
            power_usage_watt,
            level: 1.0,
        })
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn set_level(&mut self, level: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&level) {
            return Err(SimError::validation(format!(
                "level must be between 0.0 and 1.0, got {level}"
            )));
        }
        self.level = level;
        Ok(())
    }

    /// Power currently delivered at this duty level, W
    pub fn effective_watt(&self) -> f64 {
        self.power_usage_watt * self.level
    }
}

/// Consumers that affect the climate of their environment
pub trait SmartDevice: Device {
    fn smart(&self) -> &SmartCore;

    fn smart_mut(&mut self) -> &mut SmartCore;

    /// Whether the device is drawing power right now
    fn is_drawing(&self) -> bool;

    /// Kind-specific mode flags, e.g. `is_heating`
    fn mode_flags(&self) -> Vec<(&'static str, bool)>;

    fn set_setpoint(&mut self, value: f64);

    fn level(&self) -> f64 {
        self.smart().level()
    }

    fn set_level(&mut self, level: f64) -> Result<()> {
        self.smart_mut().set_level(level)
    }

    /// Energy used over `millis_passed`, kWh
    fn get_power_usage(&self, millis_passed: u64) -> f64 {
        if !self.is_active() || !self.is_drawing() {
            return 0.0;
        }
        watt_to_kwh(self.smart().effective_watt(), millis_passed)
    }

    fn publish_state(&self, millis_passed: u64) -> Result<()> {
        let core = self.core();
        let ts = core.timestamp()?;

        core.publish_active(ts)?;
        for (flag, on) in self.mode_flags() {
            core.publish(TelemetryMessage::flag(flag, on, ts))?;
        }
        core.publish(TelemetryMessage::new(
            "power_usage",
            self.get_power_usage(millis_passed),
            "kWh",
            ts,
        ))?;
        core.publish(TelemetryMessage::new("level", self.level(), "", ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bounds() {
        let mut core = SmartCore::new(1000.0).unwrap();
        assert_eq!(core.level(), 1.0);
        core.set_level(0.25).unwrap();
        assert_eq!(core.effective_watt(), 250.0);
        assert!(core.set_level(1.5).is_err());
        assert!(core.set_level(-0.1).is_err());
        assert_eq!(core.level(), 0.25);
    }

    #[test]
    fn test_negative_power_rejected() {
        assert!(matches!(SmartCore::new(-5.0), Err(SimError::Validation(_))));
    }
}
