//! # Simulation Clock
//!
//! Simulated time advances only in whole ticks:
//!
//! ```text
//! current_date = starting_timestamp + current_tick * base_millis_per_tick
//! ```
//!
//! The speed multiplier only stretches or shrinks the wall-clock interval the
//! background loop allots to each tick. It never changes how much simulated
//! time a tick covers.

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SimError};

pub const MIN_SPEED: f64 = 0.01;
pub const MAX_SPEED: f64 = 100.0;
pub const MIN_MILLIS_PER_TICK: u64 = 1;
pub const MAX_MILLIS_PER_TICK: u64 = 7 * 24 * 60 * 60 * 1000;
/// 15 minutes of simulated time per tick
pub const DEFAULT_MILLIS_PER_TICK: u64 = 15 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    current_tick: u64,
    base_millis_per_tick: u64,
    speed_multiplier: f64,
    starting_timestamp: DateTime<Utc>,
}

impl SimClock {
    pub fn new(starting_timestamp: DateTime<Utc>) -> Self {
        Self {
            current_tick: 0,
            base_millis_per_tick: DEFAULT_MILLIS_PER_TICK,
            speed_multiplier: 1.0,
            starting_timestamp,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn starting_timestamp(&self) -> DateTime<Utc> {
        self.starting_timestamp
    }

    pub fn time_resolution(&self) -> u64 {
        self.base_millis_per_tick
    }

    pub fn current_date(&self) -> DateTime<Utc> {
        let elapsed = self.current_tick as i64 * self.base_millis_per_tick as i64;
        self.starting_timestamp + ChronoDuration::milliseconds(elapsed)
    }

    /// Time of day in fractional hours
    pub fn hour_of_day(&self) -> f64 {
        let date = self.current_date();
        date.hour() as f64 + date.minute() as f64 / 60.0 + date.second() as f64 / 3600.0
    }

    pub fn speed(&self) -> f64 {
        self.speed_multiplier
    }

    /// Wall-clock milliseconds allotted to one tick by the background loop
    pub fn simulated_millis_per_tick(&self) -> f64 {
        self.base_millis_per_tick as f64 * self.speed_multiplier
    }

    pub fn set_speed(&mut self, multiplier: f64) -> Result<()> {
        if !(MIN_SPEED..=MAX_SPEED).contains(&multiplier) {
            return Err(SimError::validation(format!(
                "multiplier must be between {MIN_SPEED} and {MAX_SPEED}, got {multiplier}"
            )));
        }
        self.speed_multiplier = multiplier;
        Ok(())
    }

    /// Change simulated milliseconds per tick, keeping the speed ratio
    pub fn set_time_resolution(&mut self, millis_per_tick: u64) -> Result<()> {
        if !(MIN_MILLIS_PER_TICK..=MAX_MILLIS_PER_TICK).contains(&millis_per_tick) {
            return Err(SimError::validation(format!(
                "time resolution must be between a millisecond ({MIN_MILLIS_PER_TICK}) and a week \
                 ({MAX_MILLIS_PER_TICK}), got {millis_per_tick}"
            )));
        }
        self.base_millis_per_tick = millis_per_tick;
        Ok(())
    }

    /// Wall-clock budget for one tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.simulated_millis_per_tick() / 1000.0)
    }

    pub(crate) fn advance(&mut self) {
        self.current_tick += 1;
    }
}
