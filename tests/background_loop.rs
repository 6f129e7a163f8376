//! Real-time paced loop: start/stop lifecycle and deadline enforcement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use building_sim::bus::{BroadcastSink, MemorySink, TelemetryError, TelemetryMessage, TelemetrySink};
use building_sim::domain::{Device, Heating};
use building_sim::error::SimError;
use building_sim::simulation::Simulation;
use chrono::{TimeZone, Utc};

/// Sink that blocks on every publish, making each tick slower than its budget
struct SlowSink {
    delay: Duration,
}

impl TelemetrySink for SlowSink {
    fn publish(&self, _topic: &str, _message: &TelemetryMessage) -> Result<(), TelemetryError> {
        std::thread::sleep(self.delay);
        Ok(())
    }
}

/// Sink that blocks once, on the first publish it sees
struct StallOnce {
    delay: Duration,
    stalled: AtomicBool,
}

impl StallOnce {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            stalled: AtomicBool::new(false),
        }
    }
}

impl TelemetrySink for StallOnce {
    fn publish(&self, _topic: &str, _message: &TelemetryMessage) -> Result<(), TelemetryError> {
        if !self.stalled.swap(true, Ordering::SeqCst) {
            std::thread::sleep(self.delay);
        }
        Ok(())
    }
}

fn paced(sink: Arc<dyn TelemetrySink>, speed: f64) -> Simulation {
    let sim = Simulation::with_start(Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap(), sink)
        .with_seed(Some(3));
    sim.set_time_resolution(1000).unwrap();
    sim.set_simulation_speed(speed).unwrap();
    sim
}

#[tokio::test(flavor = "multi_thread")]
async fn loop_ticks_until_stopped() {
    let sink = Arc::new(MemorySink::new());
    // 1 s resolution at 0.05 gives a 50 ms tick
    let sim = paced(sink.clone(), 0.05);
    let office = sim.create_new_environment("office").unwrap();
    sim.with_environment_mut(office, |env| {
        env.install(|owner| Heating::new("heater", owner, 1000.0, 22.0))
    })
    .unwrap()
    .unwrap();

    sim.start().unwrap();
    assert!(sim.is_running());
    tokio::time::sleep(Duration::from_millis(400)).await;
    sim.stop().await.unwrap();

    assert!(!sim.is_running());
    let ticks = sim.current_tick();
    assert!(ticks >= 2, "only {ticks} ticks in 400 ms");
    assert!(sink.count_suffix("/weather/temperature") as u64 >= ticks);

    // no further ticks once stopped
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(sim.current_tick(), ticks);

    // manual stepping is allowed again
    sim.tick().unwrap();
    assert_eq!(sim.current_tick(), ticks + 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_transitions_are_checked() {
    let sim = paced(Arc::new(MemorySink::new()), 1.0);

    assert!(matches!(sim.stop().await, Err(SimError::IllegalStateTransition(_))));
    sim.start().unwrap();
    assert!(matches!(sim.start(), Err(SimError::IllegalStateTransition(_))));
    assert!(matches!(sim.tick(), Err(SimError::IllegalStateTransition(_))));
    sim.stop().await.unwrap();

    sim.start().unwrap();
    sim.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn overrun_aborts_with_deadline_exceeded() {
    let sink = Arc::new(SlowSink {
        delay: Duration::from_millis(20),
    });
    // 10 ms budget; one environment publishes 14 messages per tick
    let sim = paced(sink, 0.01);
    sim.create_new_environment("server-room").unwrap();

    sim.start().unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), sim.wait())
        .await
        .expect("loop should abort well within 5 s");

    match outcome {
        Err(SimError::DeadlineExceeded { elapsed, budget }) => {
            assert!((budget.as_secs_f64() - 0.010).abs() < 1e-6, "{budget:?}");
            assert!(elapsed > budget);
        }
        other => panic!("expected DeadlineExceeded, got {other:?}"),
    }
    assert!(!sim.is_running());
    assert!(sim.has_aborted());
    // the loop stopped right after the overrunning tick
    assert_eq!(sim.current_tick(), 1);

    // the supervisor still sees the failure when it stops the loop
    assert!(matches!(sim.stop().await, Err(SimError::DeadlineExceeded { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_sink_does_not_stop_the_loop() {
    // no subscriber: every publish fails
    let sim = paced(Arc::new(BroadcastSink::new(16)), 0.05);
    sim.create_new_environment("garage").unwrap();

    sim.start().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(sim.is_running());
    sim.stop().await.unwrap();
    assert!(sim.current_tick() >= 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn speed_can_change_while_running() {
    let sim = paced(Arc::new(MemorySink::new()), 1.0);
    sim.create_new_environment("lobby").unwrap();

    sim.start().unwrap();
    sim.set_simulation_speed(0.05).unwrap();
    assert!(matches!(sim.set_simulation_speed(0.0), Err(SimError::Validation(_))));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    sim.stop().await.unwrap();

    // the first tick ran at 1 s pacing, later ones at 50 ms
    assert!(sim.current_tick() >= 3, "{}", sim.current_tick());
}

#[tokio::test(flavor = "multi_thread")]
async fn commands_apply_while_running() {
    let sim = paced(Arc::new(MemorySink::new()), 0.05);
    let hall = sim.create_new_environment("hall").unwrap();
    let heater = sim
        .with_environment_mut(hall, |env| env.install(|owner| Heating::new("heater", owner, 800.0, 20.0)))
        .unwrap()
        .unwrap();

    sim.start().unwrap();
    sim.apply_command_json(heater, r#"{"status":"ON","target_value":23.0}"#)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    sim.stop().await.unwrap();

    sim.with_environment(hall, |env| {
        let heater = env.device::<Heating>(heater).unwrap();
        assert!(heater.is_active());
        assert_eq!(heater.target_temp, 23.0);
    })
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn busy_loop_stays_registered_until_it_exits() {
    // one 1.5 s stall inside the first tick; the 60 s budget is never at risk
    let sim = paced(Arc::new(StallOnce::new(Duration::from_millis(1500))), 60.0);
    sim.create_new_environment("plant-room").unwrap();

    sim.start().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // the first tick is still inside the sink
    assert!(matches!(sim.stop().await, Err(SimError::TaskFailed(_))));
    assert!(sim.is_running());
    assert!(matches!(sim.start(), Err(SimError::IllegalStateTransition(_))));
    assert!(matches!(sim.tick(), Err(SimError::IllegalStateTransition(_))));

    // the cancelled loop exits after finishing its tick, not before
    tokio::time::timeout(Duration::from_secs(5), sim.wait())
        .await
        .expect("loop should exit once the tick completes")
        .unwrap();
    assert!(!sim.is_running());
    assert!(!sim.has_aborted());
    assert_eq!(sim.current_tick(), 1);
    sim.stop().await.unwrap();

    // a fresh loop starts cleanly and is not disturbed by the old one
    sim.start().unwrap();
    assert!(sim.is_running());
    sim.stop().await.unwrap();
    assert!(!sim.is_running());
    assert!(matches!(sim.stop().await, Err(SimError::IllegalStateTransition(_))));
}

#[tokio::test]
async fn slow_ticks_do_not_starve_the_runtime() {
    // single-threaded runtime: a tick run inline would block every other task
    let sim = paced(Arc::new(StallOnce::new(Duration::from_millis(400))), 60.0);
    sim.create_new_environment("boiler-room").unwrap();

    sim.start().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(
        started.elapsed() < Duration::from_millis(200),
        "timer delayed by {:?}",
        started.elapsed()
    );

    sim.stop().await.unwrap();
}
