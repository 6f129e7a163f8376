use std::any::Any;

use super::{Device, DeviceClass, DeviceContext, DeviceCore, SmartCore, SmartDevice};
use crate::error::Result;
use crate::simulation::EnvironmentRef;

pub const DEFAULT_COOLING_TARGET: f64 = 24.0;

/// Cooling unit; runs while the zone is above its target temperature
#[derive(Debug)]
pub struct AirConditioning {
    core: DeviceCore,
    smart: SmartCore,
    pub target_temp: f64,
    is_cooling: bool,
}

impl AirConditioning {
    pub fn new(name: &str, owner: EnvironmentRef, power_usage_watt: f64, target_temp: f64) -> Result<Self> {
        Ok(Self {
            core: DeviceCore::new(name, owner)?,
            smart: SmartCore::new(power_usage_watt)?,
            target_temp,
            is_cooling: false,
        })
    }

    pub fn is_cooling(&self) -> bool {
        self.is_cooling
    }
}

impl Device for AirConditioning {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::AirConditioning
    }

    fn update(&mut self, millis_passed: u64, ctx: &mut DeviceContext<'_>) -> Result<()> {
        self.is_cooling = self.is_active() && ctx.ambient_temperature() > self.target_temp;
        if self.is_cooling {
            ctx.apply_cooling(self.smart.effective_watt());
        }
        self.publish_state(millis_passed)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_smart_device(&self) -> Option<&dyn SmartDevice> {
        Some(self)
    }

    fn as_smart_device_mut(&mut self) -> Option<&mut dyn SmartDevice> {
        Some(self)
    }
}

impl SmartDevice for AirConditioning {
    fn smart(&self) -> &SmartCore {
        &self.smart
    }

    fn smart_mut(&mut self) -> &mut SmartCore {
        &mut self.smart
    }

    fn is_drawing(&self) -> bool {
        self.is_cooling
    }

    fn mode_flags(&self) -> Vec<(&'static str, bool)> {
        vec![("is_cooling", self.is_cooling)]
    }

    fn set_setpoint(&mut self, value: f64) {
        self.target_temp = value;
    }
}
