use std::any::Any;

use super::{Device, DeviceClass, DeviceContext, DeviceCore, SmartCore, SmartDevice};
use crate::error::Result;
use crate::simulation::EnvironmentRef;

/// Lumens emitted at full level
pub const FIXED_LUMENS: f64 = 1200.0;
pub const DEFAULT_BRIGHTNESS_THRESHOLD: f64 = 0.3;

/// Light fixture switching on when its surroundings get dark
#[derive(Debug)]
pub struct Lighting {
    core: DeviceCore,
    smart: SmartCore,
    pub brightness_threshold: f64,
    /// Manual switch position; `None` follows ambient brightness
    manual: Option<bool>,
    is_on: bool,
}

impl Lighting {
    pub fn new(name: &str, owner: EnvironmentRef, power_usage_watt: f64, brightness_threshold: f64) -> Result<Self> {
        Ok(Self {
            core: DeviceCore::new(name, owner)?,
            smart: SmartCore::new(power_usage_watt)?,
            brightness_threshold,
            manual: None,
            is_on: false,
        })
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Force the light on or off, or hand control back to the sensor with `None`
    pub fn set_manual(&mut self, on: Option<bool>) {
        self.manual = on;
    }
}

impl Device for Lighting {
    fn core(&self) -> &DeviceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut DeviceCore {
        &mut self.core
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::Lighting
    }

    fn update(&mut self, millis_passed: u64, ctx: &mut DeviceContext<'_>) -> Result<()> {
        self.is_on = self.is_active()
            && self
                .manual
                .unwrap_or_else(|| ctx.brightness() < self.brightness_threshold);
        if self.is_on {
            ctx.apply_lighting(FIXED_LUMENS * self.smart.level());
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

impl SmartDevice for Lighting {
    fn smart(&self) -> &SmartCore {
        &self.smart
    }

    fn smart_mut(&mut self) -> &mut SmartCore {
        &mut self.smart
    }

    fn is_drawing(&self) -> bool {
        self.is_on
    }

    fn mode_flags(&self) -> Vec<(&'static str, bool)> {
        vec![("is_on", self.is_on)]
    }

    fn set_setpoint(&mut self, value: f64) {
        self.brightness_threshold = value;
    }
}
