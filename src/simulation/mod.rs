//! # Simulation Engine
//!
//! Drives a set of modelled building zones through discrete simulated time.
//!
//! ## Components
//!
//! - **Clock**: tick counter, time resolution and wall-clock speed
//! - **Environment**: one zone with its weather, devices and thermal mass
//! - **Scheduler**: anchored real-time pacing loop with deadline checks
//! - **Owner links**: non-owning back-references that fail once the owner is gone
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use building_sim::bus::MemorySink;
//! use building_sim::domain::{Device, PhotoVoltaic};
//! use building_sim::simulation::Simulation;
//!
//! let sim = Simulation::new(Arc::new(MemorySink::new()));
//! let garden = sim.create_new_environment("garden").unwrap();
//! sim.with_environment_mut(garden, |env| {
//!     env.install(|owner| PhotoVoltaic::new("pv-roof", owner, 5000.0))
//! })
//! .unwrap()
//! .unwrap();
//!
//! // Advance one tick (15 simulated minutes by default)
//! sim.tick().unwrap();
//! ```

pub mod clock;
pub mod engine;
pub mod environment;
pub mod owner;
pub mod scheduler;

pub use clock::SimClock;
pub use engine::Simulation;
pub use environment::{EnergyBalance, Environment, EnvironmentSnapshot, ThermalLoad};
pub use owner::{EnvironmentRef, SimulationContext, SimulationRef};

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    use super::{EnvironmentRef, SimClock, SimulationContext, SimulationRef};
    use crate::bus::{MemorySink, Publisher};
    use crate::domain::EnvironmentId;

    /// Keeps a test's simulation context and sink alive
    pub(crate) type Harness = (Arc<SimulationContext>, Arc<MemorySink>);

    /// A registered environment link on a clock starting 2024-06-15 at `hour`:00 UTC
    pub(crate) fn owner_at(hour: u32) -> (Arc<SimulationContext>, EnvironmentRef, Arc<MemorySink>) {
        let start = Utc.with_ymd_and_hms(2024, 6, 15, hour, 0, 0).unwrap();
        let sink = Arc::new(MemorySink::new());
        let context = Arc::new(SimulationContext::new(
            SimClock::new(start),
            Publisher::new("bems", sink.clone()),
        ));

        let id = EnvironmentId::new();
        context.register(id);
        let owner = EnvironmentRef::new(SimulationRef::new(&context), id);
        (context, owner, sink)
    }
}
