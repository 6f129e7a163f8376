use anyhow::{Context, Result};
use building_sim::bus::{log_subscriber, BroadcastSink, LogSink, MemorySink, TelemetrySink};
use building_sim::config::{Config, SinkKind, TelemetryConfig};
use building_sim::error::SimError;
use building_sim::simulation::Simulation;
use building_sim::telemetry;
use std::sync::Arc;
use tracing::{error, info};

fn build_sink(cfg: &TelemetryConfig) -> Arc<dyn TelemetrySink> {
    match cfg.sink {
        SinkKind::Log => Arc::new(LogSink),
        SinkKind::Memory => Arc::new(MemorySink::with_history_limit(cfg.history_limit)),
        SinkKind::Broadcast => {
            let sink = BroadcastSink::new(cfg.channel_capacity);
            tokio::spawn(log_subscriber(sink.subscribe()));
            Arc::new(sink)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("reading .env");
        }
    }
    telemetry::init_tracing();

    let cfg = Config::load().context("loading configuration")?;
    let sim = Simulation::from_config(&cfg, build_sink(&cfg.telemetry)).context("building simulation")?;

    info!(
        environments = cfg.environments.len(),
        interval = ?sim.tick_interval(),
        start = %sim.get_current_date(),
        "starting building simulation"
    );
    sim.start()?;

    let outcome = tokio::select! {
        _ = telemetry::shutdown_signal() => sim.stop().await,
        result = sim.wait() => {
            // the loop already exited; collect its handle
            match sim.stop().await {
                Err(SimError::IllegalStateTransition(_)) => result,
                other => other,
            }
        }
    };

    match outcome {
        Ok(()) => {
            info!(tick = sim.current_tick(), "shutdown complete");
            Ok(())
        }
        Err(e @ SimError::DeadlineExceeded { .. }) => {
            error!(error = %e, tick = sim.current_tick(), "simulation fell behind real time");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
