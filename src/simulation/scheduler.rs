//! Real-time pacing loop.
//!
//! The loop keeps an absolute anchor on the monotonic clock and advances it
//! by one tick interval per iteration. A tick that takes longer than its
//! interval, or a wake-up that lands too far behind the anchor, ends the
//! loop with [`SimError::DeadlineExceeded`]; ticks are never merged or
//! skipped to catch up.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::environment::Environment;
use super::owner::SimulationContext;
use crate::error::{Result, SimError};

/// How far behind its anchor a wake-up may land
pub const MAX_WAKEUP_LAG: Duration = Duration::from_millis(500);

/// Run one tick over every environment, in insertion order
pub(crate) fn advance(context: &SimulationContext, environments: &Mutex<Vec<Environment>>) -> Result<()> {
    let mut environments = environments.lock();
    let millis = context.clock.read().time_resolution();

    for environment in environments.iter_mut() {
        environment.update(millis)?;
    }
    context.clock.write().advance();
    Ok(())
}

/// Handle on a spawned pacing loop
///
/// Each runner owns its outcome slot, so a loop that exits late can never
/// overwrite the state of a loop started after it.
pub(crate) struct Runner {
    cancel: CancellationToken,
    finished: CancellationToken,
    outcome: Arc<Mutex<Option<SimError>>>,
    handle: JoinHandle<Result<()>>,
}

impl Runner {
    pub(crate) fn spawn(
        context: Arc<SimulationContext>,
        environments: Arc<Mutex<Vec<Environment>>>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SimError::illegal_transition("background loop needs a tokio runtime"))?;

        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        let outcome = Arc::new(Mutex::new(None));

        let loop_cancel = cancel.clone();
        let loop_finished = finished.clone();
        let loop_outcome = Arc::clone(&outcome);

        let handle = runtime.spawn(async move {
            // cancelled on every exit path, panics included
            let _finished = loop_finished.drop_guard();
            let result = run(context, environments, &loop_cancel).await;

            match &result {
                Ok(()) => info!("simulation loop stopped"),
                Err(e) => error!(error = %e, "simulation loop aborted"),
            }
            *loop_outcome.lock() = result.clone().err();
            result
        });

        Ok(Self {
            cancel,
            finished,
            outcome,
            handle,
        })
    }

    pub(crate) fn finished(&self) -> CancellationToken {
        self.finished.clone()
    }

    /// Whether the spawned task has exited
    pub(crate) fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    /// Whether the loop exited on its own rather than being asked to stop
    pub(crate) fn has_aborted(&self) -> bool {
        self.is_finished() && !self.cancel.is_cancelled()
    }

    pub(crate) fn outcome(&self) -> Arc<Mutex<Option<SimError>>> {
        Arc::clone(&self.outcome)
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Collect the result of a loop that has already exited
    pub(crate) async fn join(self) -> Result<()> {
        match self.handle.await {
            Ok(result) => result,
            Err(join) => Err(SimError::TaskFailed(join.to_string())),
        }
    }
}

/// Wait at most `timeout` for a loop to signal that it exited
pub(crate) async fn await_exit(finished: CancellationToken, timeout: Duration) -> Result<()> {
    tokio::time::timeout(timeout, finished.cancelled())
        .await
        .map_err(|_| SimError::TaskFailed(format!("loop did not exit within {timeout:?}")))
}

async fn run(
    context: Arc<SimulationContext>,
    environments: Arc<Mutex<Vec<Environment>>>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut anchor = Instant::now();
    info!(interval = ?context.clock.read().tick_interval(), "simulation loop started");

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let budget = context.clock.read().tick_interval();
        let started = Instant::now();
        let lag = started.saturating_duration_since(anchor);
        if lag > MAX_WAKEUP_LAG {
            return Err(SimError::DeadlineExceeded {
                elapsed: lag + budget,
                budget,
            });
        }

        // ticks block on sink I/O, keep them off the async workers
        let (tick_context, tick_environments) = (Arc::clone(&context), Arc::clone(&environments));
        tokio::task::spawn_blocking(move || advance(&tick_context, &tick_environments))
            .await
            .map_err(|join| SimError::TaskFailed(join.to_string()))??;

        let elapsed = started.elapsed();
        if elapsed > budget {
            return Err(SimError::DeadlineExceeded { elapsed, budget });
        }
        {
            let clock = context.clock.read();
            debug!(tick = clock.current_tick(), date = %clock.current_date(), elapsed = ?elapsed, "tick done");
        }

        anchor += budget;
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = sleep_until(anchor) => {}
        }
    }
}
