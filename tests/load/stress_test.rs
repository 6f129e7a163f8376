#![cfg(test)]
//! Load Testing Suite for the simulation engine
//!
//! Verifies that the engine keeps up with its real-time budget when:
//! - Many environments with full device sets tick together
//! - Commands and snapshot reads hit the simulation while the loop runs
//!
//! Key Performance Requirements:
//! - A 50-zone building ticks well inside a 100 ms budget
//! - Concurrent readers never stall the paced loop into a deadline overrun

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use building_sim::bus::{CommandStatus, DeviceCommand, MemorySink};
use building_sim::domain::{
    AirConditioning, ElectricGrid, EnergyStorage, Heating, Lighting, PhotoVoltaic, WindTurbine,
};
use building_sim::simulation::Simulation;
use building_sim::weather::WeatherClass;
use chrono::Utc;

fn build_building(zones: usize) -> (Arc<Simulation>, Vec<building_sim::domain::DeviceId>) {
    let sim = Simulation::with_start(Utc::now(), Arc::new(MemorySink::new())).with_seed(Some(99));
    let mut heaters = Vec::new();

    for zone in 0..zones {
        let weather = if zone % 2 == 0 { WeatherClass::Indoor } else { WeatherClass::Outdoor };
        let id = sim
            .create_environment(&format!("zone-{zone}"), weather, 20.0, 0.8)
            .unwrap();
        let heater = sim
            .with_environment_mut(id, |env| {
                env.install(|o| ElectricGrid::new(o, 0.8))?;
                if weather == WeatherClass::Outdoor {
                    env.install(|o| PhotoVoltaic::new("pv-roof", o, 4000.0))?;
                    env.install(|o| WindTurbine::new("turbine", o, 2000.0, 12.0))?;
                }
                env.install(|o| EnergyStorage::new("battery", o, 10.0, 2.0, 2.0))?;
                env.install(|o| AirConditioning::new("airco", o, 1200.0, 24.0))?;
                env.install(|o| Lighting::new("lamp", o, 60.0, 0.3))?;
                env.install(|o| Heating::new("heater", o, 2000.0, 21.0))
            })
            .unwrap()
            .unwrap();
        heaters.push(heater);
    }

    for &heater in &heaters {
        sim.apply_command(heater, &DeviceCommand::new(CommandStatus::On)).unwrap();
    }
    (Arc::new(sim), heaters)
}

/// Test: Tick latency of a large building
#[test]
#[ignore] // Ignore by default as this is a slow test
fn test_tick_latency_with_many_zones() {
    let (sim, _heaters) = build_building(50);
    let mut measurements = Vec::new();

    for _ in 0..200 {
        let start = Instant::now();
        sim.tick().unwrap();
        measurements.push(start.elapsed());
    }

    let max_latency = measurements.iter().max().unwrap();
    let avg_latency: Duration = measurements.iter().sum::<Duration>() / measurements.len() as u32;
    println!("Tick latency - Max: {:?}, Avg: {:?}", max_latency, avg_latency);

    assert!(
        *max_latency < Duration::from_millis(100),
        "Tick latency exceeded 100ms: {:?}",
        max_latency
    );
}

/// Test: Paced loop under concurrent command and snapshot load
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Ignore by default as this is a slow test
async fn test_loop_survives_concurrent_clients() {
    let (sim, heaters) = build_building(20);
    sim.set_time_resolution(60_000).unwrap();
    // 600 ms per tick
    sim.set_simulation_speed(0.01).unwrap();
    sim.start().unwrap();

    let mut clients = JoinSet::new();
    for i in 0..20 {
        let sim = Arc::clone(&sim);
        let heater = heaters[i % heaters.len()];
        clients.spawn(async move {
            for n in 0..25 {
                let status = if n % 2 == 0 { CommandStatus::Economy } else { CommandStatus::On };
                sim.apply_command(heater, &DeviceCommand::new(status).with_target(20.0 + n as f64 * 0.1))
                    .unwrap();
                let _ = sim.environments();
                tokio::time::sleep(Duration::from_millis(20 + (i % 10) as u64)).await;
            }
        });
    }

    while let Some(result) = clients.join_next().await {
        result.expect("client task should complete");
    }

    assert!(sim.is_running(), "loop aborted under load");
    sim.stop().await.unwrap();
    assert!(sim.current_tick() >= 1);
}
