pub mod air_conditioning;
pub mod device;
pub mod energy_source;
pub mod energy_storage;
pub mod factory;
pub mod grid;
pub mod heating;
pub mod lighting;
pub mod photovoltaic;
pub mod smart_device;
pub mod types;
pub mod wind_turbine;

pub use air_conditioning::*;
pub use device::*;
pub use energy_source::EnergySource;
pub use energy_storage::*;
pub use factory::*;
pub use grid::*;
pub use heating::*;
pub use lighting::*;
pub use photovoltaic::*;
pub use smart_device::*;
pub use types::*;
pub use wind_turbine::*;
