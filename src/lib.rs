//! Building environment and energy device simulator.
//!
//! A [`simulation::Simulation`] owns modelled zones ([`simulation::Environment`]),
//! each with its own [`weather::Weather`] and a set of devices from
//! [`domain`]. Ticks advance simulated time either on demand or on a paced
//! background loop, and every reading is published through [`bus`].

pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod simulation;
pub mod telemetry;
pub mod weather;
