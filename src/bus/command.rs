use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Result, SimError};

/// Level cap applied when a device is put into economy mode
pub const ECONOMY_LEVEL_CAP: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum CommandStatus {
    On,
    Off,
    Economy,
}

/// Device command issued by an optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub status: CommandStatus,
    #[serde(default)]
    pub target_value: Option<f64>,
    /// Percent of rated power, 0-100
    #[serde(default)]
    pub power_limit: Option<f64>,
}

impl DeviceCommand {
    pub fn new(status: CommandStatus) -> Self {
        Self {
            status,
            target_value: None,
            power_limit: None,
        }
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.target_value = Some(target);
        self
    }

    pub fn with_power_limit(mut self, percent: f64) -> Self {
        self.power_limit = Some(percent);
        self
    }

    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| SimError::validation(format!("malformed device command: {e}")))
    }

    /// Duty level requested by this command, if any
    pub fn requested_level(&self) -> Result<Option<f64>> {
        let limit = match self.power_limit {
            Some(pct) if !(0.0..=100.0).contains(&pct) => {
                return Err(SimError::validation(format!(
                    "power_limit must be between 0 and 100 percent, got {pct}"
                )))
            }
            Some(pct) => Some(pct / 100.0),
            None => None,
        };

        Ok(match (self.status, limit) {
            (CommandStatus::Economy, Some(level)) => Some(level.min(ECONOMY_LEVEL_CAP)),
            (CommandStatus::Economy, None) => Some(ECONOMY_LEVEL_CAP),
            (_, level) => level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_command() {
        let cmd = DeviceCommand::from_json(r#"{"status":"ECONOMY","target_value":19.5,"power_limit":80}"#)
            .unwrap();
        assert_eq!(cmd.status, CommandStatus::Economy);
        assert_eq!(cmd.target_value, Some(19.5));
        assert_eq!(cmd.requested_level().unwrap(), Some(0.5));
    }

    #[test]
    fn test_missing_optional_fields() {
        let cmd = DeviceCommand::from_json(r#"{"status":"OFF"}"#).unwrap();
        assert_eq!(cmd, DeviceCommand::new(CommandStatus::Off));
        assert_eq!(cmd.requested_level().unwrap(), None);
    }

    #[test]
    fn test_power_limit_out_of_range() {
        let cmd = DeviceCommand::new(CommandStatus::On).with_power_limit(140.0);
        assert!(matches!(cmd.requested_level(), Err(SimError::Validation(_))));
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(DeviceCommand::from_json(r#"{"status":"TURBO"}"#).is_err());
        assert_eq!("ON".parse::<CommandStatus>().unwrap(), CommandStatus::On);
    }
}
