use super::Device;
use crate::weather::Weather;

pub(crate) const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Devices that produce, store or supply energy
pub trait EnergySource: Device {
    /// Energy produced over `millis_passed` under `weather`, in kWh
    fn calculate_production(&self, weather: &Weather, millis_passed: u64) -> f64;
}

/// Energy in kWh delivered by `power_watt` over `millis`
pub(crate) fn watt_to_kwh(power_watt: f64, millis: u64) -> f64 {
    power_watt * (millis as f64 / MILLIS_PER_HOUR) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watt_to_kwh() {
        assert!((watt_to_kwh(5000.0, 3_600_000) - 5.0).abs() < 1e-12);
        assert!((watt_to_kwh(1000.0, 900_000) - 0.25).abs() < 1e-12);
        assert_eq!(watt_to_kwh(0.0, 3_600_000), 0.0);
    }
}
