use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::clock::SimClock;
use super::environment::{Environment, EnvironmentSnapshot, DEFAULT_INSULATION, DEFAULT_TEMPERATURE};
use super::owner::{EnvironmentRef, SimulationContext, SimulationRef};
use super::scheduler::{self, Runner};
use crate::bus::{DeviceCommand, Publisher, TelemetrySink};
use crate::config::Config;
use crate::domain::{DeviceId, EnvironmentId};
use crate::error::{Result, SimError};
use crate::weather::WeatherClass;

pub const DEFAULT_TOPIC_PREFIX: &str = "bems";
/// Bound on how long `stop` waits for the loop to exit
pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Owns every environment and drives them tick by tick
pub struct Simulation {
    context: Arc<SimulationContext>,
    environments: Arc<Mutex<Vec<Environment>>>,
    runner: Mutex<Option<Runner>>,
    seed: Option<u64>,
}

impl Simulation {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self::with_start(Utc::now(), sink)
    }

    pub fn with_start(start: DateTime<Utc>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self::with_publisher(SimClock::new(start), Publisher::new(DEFAULT_TOPIC_PREFIX, sink))
    }

    pub fn with_publisher(clock: SimClock, publisher: Publisher) -> Self {
        Self {
            context: Arc::new(SimulationContext::new(clock, publisher)),
            environments: Arc::new(Mutex::new(Vec::new())),
            runner: Mutex::new(None),
            seed: None,
        }
    }

    /// Seed weather randomness; environment `n` gets `seed + n`
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Build a simulation with every configured environment and device
    pub fn from_config(config: &Config, sink: Arc<dyn TelemetrySink>) -> Result<Self> {
        let start = config.simulation.starting_timestamp.unwrap_or_else(Utc::now);
        let mut clock = SimClock::new(start);
        clock.set_time_resolution(config.simulation.base_millis_per_tick)?;
        clock.set_speed(config.simulation.speed)?;

        let simulation = Self::with_publisher(clock, Publisher::new(config.telemetry.topic_prefix.clone(), sink))
            .with_seed(config.simulation.seed);

        for env_config in &config.environments {
            let id = simulation.create_environment(
                &env_config.name,
                env_config.weather,
                env_config.initial_temperature,
                env_config.insulation,
            )?;
            simulation.with_environment_mut(id, |env| {
                env_config
                    .devices
                    .iter()
                    .try_for_each(|device| env.install_from_config(device).map(|_| ()))
            })??;
        }

        info!(
            environments = config.environments.len(),
            resolution_ms = config.simulation.base_millis_per_tick,
            speed = config.simulation.speed,
            "simulation built from config"
        );
        Ok(simulation)
    }

    pub fn simulation_ref(&self) -> SimulationRef {
        SimulationRef::new(&self.context)
    }

    pub fn create_new_environment(&self, name: &str) -> Result<EnvironmentId> {
        self.create_environment(name, WeatherClass::Outdoor, DEFAULT_TEMPERATURE, DEFAULT_INSULATION)
    }

    pub fn create_environment(
        &self,
        name: &str,
        weather: WeatherClass,
        initial_temperature: f64,
        insulation: f64,
    ) -> Result<EnvironmentId> {
        let mut environments = self.environments.lock();
        let id = EnvironmentId::new();
        let owner = EnvironmentRef::new(self.simulation_ref(), id);
        let seed = self.seed.map(|s| s.wrapping_add(environments.len() as u64));

        let environment = Environment::new(name, owner, weather, initial_temperature, insulation, seed)?;
        self.context.register(id);
        environments.push(environment);

        info!(environment = name, %id, weather = %weather, "environment created");
        Ok(id)
    }

    /// Detach an environment; links held by its weather and devices stop resolving
    pub fn remove_environment(&self, id: EnvironmentId) -> Result<Environment> {
        let mut environments = self.environments.lock();
        let index = environments
            .iter()
            .position(|env| env.id() == id)
            .ok_or_else(|| SimError::NotFound(format!("environment {id}")))?;

        self.context.unregister(id);
        let environment = environments.remove(index);
        info!(environment = environment.name(), %id, "environment removed");
        Ok(environment)
    }

    pub fn environments(&self) -> Vec<EnvironmentSnapshot> {
        self.environments.lock().iter().map(Environment::snapshot).collect()
    }

    pub fn environment_ids(&self) -> Vec<EnvironmentId> {
        self.environments.lock().iter().map(Environment::id).collect()
    }

    pub fn with_environment<R>(&self, id: EnvironmentId, f: impl FnOnce(&Environment) -> R) -> Result<R> {
        let environments = self.environments.lock();
        let env = environments
            .iter()
            .find(|env| env.id() == id)
            .ok_or_else(|| SimError::NotFound(format!("environment {id}")))?;
        Ok(f(env))
    }

    pub fn with_environment_mut<R>(
        &self,
        id: EnvironmentId,
        f: impl FnOnce(&mut Environment) -> R,
    ) -> Result<R> {
        let mut environments = self.environments.lock();
        let env = environments
            .iter_mut()
            .find(|env| env.id() == id)
            .ok_or_else(|| SimError::NotFound(format!("environment {id}")))?;
        Ok(f(env))
    }

    /// Route an optimizer command to the addressed device
    pub fn apply_command(&self, device: DeviceId, command: &DeviceCommand) -> Result<()> {
        let mut environments = self.environments.lock();
        let target = environments
            .iter_mut()
            .find_map(|env| env.find_device_mut(device))
            .ok_or_else(|| SimError::NotFound(format!("device {device}")))?;

        target.apply_command(command)?;
        info!(device = target.name(), status = %command.status, "command applied");
        Ok(())
    }

    pub fn apply_command_json(&self, device: DeviceId, payload: &str) -> Result<()> {
        let command = DeviceCommand::from_json(payload)?;
        self.apply_command(device, &command)
    }

    /// Advance every environment by one tick; only valid while the loop is stopped
    pub fn tick(&self) -> Result<()> {
        // held for the whole tick so `start` cannot slip in
        let runner = self.runner.lock();
        if runner.as_ref().is_some_and(|r| !r.is_finished()) {
            return Err(SimError::illegal_transition(
                "cannot tick manually while the background loop is running",
            ));
        }
        scheduler::advance(&self.context, &self.environments)
    }

    pub fn start(&self) -> Result<()> {
        let mut runner = self.runner.lock();
        if runner.as_ref().is_some_and(|r| !r.is_finished()) {
            return Err(SimError::illegal_transition("simulation is already running"));
        }
        if let Some(stale) = runner.take() {
            // a previous loop ended on its own; only its outcome is left
            warn!(outcome = ?stale.outcome().lock().clone(), "replacing finished simulation loop");
        }

        *runner = Some(Runner::spawn(self.context.clone(), self.environments.clone())?);
        info!(speed = self.get_simulation_speed(), "simulation started");
        Ok(())
    }

    /// Cancel the loop and join it; surfaces the error it ended with, if any
    ///
    /// A loop that does not exit within [`STOP_TIMEOUT`] stays registered and
    /// keeps the simulation in the running state, so it can be stopped again.
    pub async fn stop(&self) -> Result<()> {
        let finished = {
            let runner = self.runner.lock();
            let runner = runner
                .as_ref()
                .ok_or_else(|| SimError::illegal_transition("simulation is not running"))?;
            runner.cancel();
            runner.finished()
        };

        if let Err(e) = scheduler::await_exit(finished, STOP_TIMEOUT).await {
            warn!(error = %e, "simulation loop still busy");
            return Err(e);
        }

        let runner = self
            .runner
            .lock()
            .take()
            .ok_or_else(|| SimError::illegal_transition("simulation is not running"))?;
        let result = runner.join().await;
        info!(tick = self.current_tick(), "simulation stopped");
        result
    }

    /// Resolve once the loop has exited, with the error that ended it
    pub async fn wait(&self) -> Result<()> {
        let (finished, outcome) = self
            .runner
            .lock()
            .as_ref()
            .map(|r| (r.finished(), r.outcome()))
            .ok_or_else(|| SimError::illegal_transition("simulation is not running"))?;

        finished.cancelled().await;
        let outcome = outcome.lock().clone();
        match outcome {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Whether a spawned loop is still alive, including one that is shutting down
    pub fn is_running(&self) -> bool {
        self.runner.lock().as_ref().is_some_and(|r| !r.is_finished())
    }

    /// Whether a started loop has exited without being stopped
    pub fn has_aborted(&self) -> bool {
        self.runner.lock().as_ref().is_some_and(Runner::has_aborted)
    }

    pub fn set_simulation_speed(&self, multiplier: f64) -> Result<()> {
        self.context.clock.write().set_speed(multiplier)?;
        info!(speed = multiplier, "simulation speed changed");
        Ok(())
    }

    pub fn get_simulation_speed(&self) -> f64 {
        self.context.clock.read().speed()
    }

    pub fn set_time_resolution(&self, millis_per_tick: u64) -> Result<()> {
        self.context.clock.write().set_time_resolution(millis_per_tick)?;
        info!(resolution_ms = millis_per_tick, "time resolution changed");
        Ok(())
    }

    pub fn get_time_resolution(&self) -> u64 {
        self.context.clock.read().time_resolution()
    }

    pub fn get_current_date(&self) -> DateTime<Utc> {
        self.context.clock.read().current_date()
    }

    pub fn current_tick(&self) -> u64 {
        self.context.clock.read().current_tick()
    }

    pub fn tick_interval(&self) -> Duration {
        self.context.clock.read().tick_interval()
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if let Some(runner) = self.runner.get_mut().as_ref() {
            runner.cancel();
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.current_tick())
            .field("running", &self.is_running())
            .field("environments", &self.environment_ids().len())
            .finish()
    }
}
