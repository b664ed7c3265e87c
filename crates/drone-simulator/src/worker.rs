//! Fleet workers: one task per fleet, driven only through channels.
//!
//! A worker owns its [`Fleet`] outright. The coordinator reaches it through
//! a private command channel and hears back on a results channel shared by
//! every worker.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::fleet::Fleet;
use crate::snapshot::DroneSnapshot;

/// Commands sent from the coordinator to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Run exactly one fleet tick stamped with this number (lockstep only).
    Tick(u64),
    /// Pause or resume a drone owned by this fleet.
    TogglePause(String),
    /// Leave the loop and report [`WorkerReport::Done`].
    Stop,
}

/// Reports sent from workers back to the coordinator.
#[derive(Debug, Clone)]
pub enum WorkerReport {
    /// Snapshots for one tick of one fleet.
    Batch {
        fleet: usize,
        tick: u64,
        snapshots: Vec<DroneSnapshot>,
    },
    /// The worker has left its loop.
    Done { fleet: usize },
}

/// How a worker decides when to tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Tick only when told to by [`WorkerCommand::Tick`].
    Lockstep,
    /// Tick on a private timer and report immediately.
    FreeRunning { interval: Duration },
}

/// Coordinator-side handle to a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a command. Fails only if the worker has exited.
    pub fn send(&self, command: WorkerCommand) -> Result<(), WorkerCommand> {
        self.commands.send(command).map_err(|err| err.0)
    }

    pub(crate) fn into_task(self) -> JoinHandle<()> {
        self.task
    }
}

/// A fleet and the channel ends it listens and reports on.
pub struct FleetWorker {
    index: usize,
    fleet: Fleet,
    commands: mpsc::UnboundedReceiver<WorkerCommand>,
    reports: mpsc::Sender<WorkerReport>,
}

impl FleetWorker {
    /// Move `fleet` onto its own task.
    pub fn spawn(
        index: usize,
        fleet: Fleet,
        mode: WorkerMode,
        reports: mpsc::Sender<WorkerReport>,
    ) -> WorkerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let name = fleet.name().to_string();

        let worker = Self {
            index,
            fleet,
            commands: rx,
            reports,
        };

        let task = tokio::spawn(async move {
            match mode {
                WorkerMode::Lockstep => worker.run_lockstep().await,
                WorkerMode::FreeRunning { interval } => worker.run_free(interval).await,
            }
        });

        WorkerHandle {
            name,
            commands: tx,
            task,
        }
    }

    async fn run_lockstep(mut self) {
        info!(fleet = %self.fleet.name(), drones = self.fleet.len(), "Fleet worker started (lockstep)");

        while let Some(command) = self.commands.recv().await {
            match command {
                WorkerCommand::Tick(tick) => {
                    if !self.tick(tick).await {
                        break;
                    }
                }
                WorkerCommand::TogglePause(drone_id) => self.toggle(&drone_id),
                WorkerCommand::Stop => break,
            }
        }

        self.finish().await;
    }

    async fn run_free(mut self, period: Duration) {
        info!(
            fleet = %self.fleet.name(),
            drones = self.fleet.len(),
            interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "Fleet worker started (free-running)"
        );

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(WorkerCommand::TogglePause(drone_id)) => self.toggle(&drone_id),
                    Some(WorkerCommand::Tick(requested)) => {
                        warn!(fleet = %self.fleet.name(), tick = requested, "Ignoring tick request in free-running mode");
                    }
                    Some(WorkerCommand::Stop) | None => break,
                },
                _ = ticker.tick() => {
                    tick += 1;
                    if !self.tick(tick).await {
                        break;
                    }
                }
            }
        }

        self.finish().await;
    }

    /// Run one fleet tick and report it. False once nobody is listening.
    async fn tick(&mut self, tick: u64) -> bool {
        let snapshots = self.fleet.tick(tick);
        debug!(fleet = %self.fleet.name(), tick, drones = snapshots.len(), "Fleet ticked");

        self.reports
            .send(WorkerReport::Batch {
                fleet: self.index,
                tick,
                snapshots,
            })
            .await
            .is_ok()
    }

    fn toggle(&mut self, drone_id: &str) {
        match self.fleet.toggle_pause(drone_id) {
            Ok(state) => info!(fleet = %self.fleet.name(), drone = drone_id, state = state.as_str(), "Drone toggled"),
            Err(err) => warn!(fleet = %self.fleet.name(), error = %err, "Toggle ignored"),
        }
    }

    async fn finish(self) {
        info!(fleet = %self.fleet.name(), "Fleet worker stopping");
        if self.reports.send(WorkerReport::Done { fleet: self.index }).await.is_err() {
            debug!(fleet = %self.fleet.name(), "Coordinator gone before done report");
        }
    }
}
