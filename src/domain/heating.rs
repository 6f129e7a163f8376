use std::any::Any;

use super::{Device, DeviceClass, DeviceContext, DeviceCore, SmartCore, SmartDevice};
use crate::error::Result;
use crate::simulation::EnvironmentRef;

pub const DEFAULT_HEATING_TARGET: f64 = 21.0;

/// Space heater; runs while the zone is below its target temperature
#[derive(Debug)]
pub struct Heating {
    core: DeviceCore,
    smart: SmartCore,
    pub target_temp: f64,
    is_heating: bool,
}

impl Heating {
    pub fn new(name: &str, owner: EnvironmentRef, power_usage_watt: f64, target_temp: f64) -> Result<Self> {
        Ok(Self {
            core: DeviceCore::new(name, owner)?,
            smart: SmartCore::new(power_usage_watt)?,
            target_temp,
            is_heating: false,
        })
    }

    pub fn is_heating(&self) -> bool {
        self.is_heating
    }
}

impl Device for Heating {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::Heating
    }

    fn update(&mut self, millis_passed: u64, ctx: &mut DeviceContext<'_>) -> Result<()> {
        self.is_heating = self.is_active() && ctx.ambient_temperature() < self.target_temp;
        if self.is_heating {
            ctx.apply_heating(self.smart.effective_watt());
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

impl SmartDevice for Heating {
    fn smart(&self) -> &SmartCore {
        &self.smart
    }

    fn smart_mut(&mut self) -> &mut SmartCore {
        &mut self.smart
    }

    fn is_drawing(&self) -> bool {
        self.is_heating
    }

    fn mode_flags(&self) -> Vec<(&'static str, bool)> {
        vec![("is_heating", self.is_heating)]
    }

    fn set_setpoint(&mut self, value: f64) {
        self.target_temp = value;
    }
}
