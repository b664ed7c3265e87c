//! Tick coordination across fleets.
//!
//! In lockstep mode the coordinator is the only clock: it asks every fleet
//! worker for tick `t`, waits until all of them have answered and only then
//! emits one merged batch and moves on to `t + 1`. In free-running mode each
//! worker keeps its own timer and the coordinator just forwards whatever
//! arrives.
//!
//! Control messages are routed to the owning worker in both modes. A worker
//! drains its command queue before it runs its next tick, so a toggle that
//! arrives between two ticks is visible in the second one.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use drone_domain::ControlCommand;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{ConfigurationError, CoordinatorError, RoutingError};
use crate::fleet::Fleet;
use crate::sink::TelemetrySink;
use crate::snapshot::{DroneSnapshot, TickBatch};
use crate::worker::{FleetWorker, WorkerCommand, WorkerHandle, WorkerMode, WorkerReport};

/// How fleets are clocked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TickMode {
    /// One shared tick; all fleets advance together.
    #[default]
    Lockstep,
    /// Every fleet ticks on its own timer.
    FreeRunning,
}

impl TickMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lockstep => "lockstep",
            Self::FreeRunning => "free",
        }
    }
}

impl fmt::Display for TickMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TickMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lockstep" | "sync" | "synchronized" => Ok(Self::Lockstep),
            "free" | "free-running" | "unsynchronized" => Ok(Self::FreeRunning),
            other => Err(format!("unknown tick mode '{other}'")),
        }
    }
}

/// Clocking parameters for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub mode: TickMode,
    pub tick_interval: Duration,
    /// Stop after this many ticks. In free-running mode every fleet batch
    /// counts, so the limit is multiplied by the number of fleets.
    pub max_ticks: Option<u64>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            mode: TickMode::Lockstep,
            tick_interval: Duration::from_secs(1),
            max_ticks: None,
        }
    }
}

/// Counters reported when a run ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub ticks: u64,
    pub batches_delivered: u64,
    pub delivery_failures: u64,
    pub commands_routed: u64,
    pub routing_errors: u64,
    pub workers_stopped: usize,
}

enum Event {
    Shutdown,
    Control(Option<ControlCommand>),
    TickDue,
    Report(Option<WorkerReport>),
}

/// Owns the fleet workers and the shared report channel.
#[derive(Debug)]
pub struct TickCoordinator {
    run_id: Uuid,
    settings: CoordinatorSettings,
    workers: Vec<WorkerHandle>,
    owners: HashMap<String, usize>,
    reports: mpsc::Receiver<WorkerReport>,
    next_tick: u64,
}

impl TickCoordinator {
    /// Validate the fleets and move each one onto its own worker task.
    ///
    /// # Errors
    ///
    /// Fails if there are no fleets, the tick interval is zero, or a fleet
    /// name appears twice.
    pub fn spawn(
        fleets: Vec<Fleet>,
        settings: CoordinatorSettings,
    ) -> Result<Self, ConfigurationError> {
        if fleets.is_empty() {
            return Err(ConfigurationError::NoFleets);
        }
        if settings.tick_interval.is_zero() {
            return Err(ConfigurationError::ZeroTickInterval);
        }

        let mut names = HashSet::new();
        let mut owners = HashMap::new();
        for (index, fleet) in fleets.iter().enumerate() {
            if !names.insert(fleet.name()) {
                return Err(ConfigurationError::DuplicateFleet(fleet.name().to_string()));
            }
            // `{fleet}-{index}` ids are unique once fleet names are.
            owners.extend(fleet.drone_ids().map(|id| (id.to_string(), index)));
        }

        let mode = match settings.mode {
            TickMode::Lockstep => WorkerMode::Lockstep,
            TickMode::FreeRunning => WorkerMode::FreeRunning {
                interval: settings.tick_interval,
            },
        };

        // Workers hold the only senders, so recv() yields None once all are gone.
        let (reports_tx, reports) = mpsc::channel(fleets.len() * 2);
        let workers: Vec<WorkerHandle> = fleets
            .into_iter()
            .enumerate()
            .map(|(index, fleet)| FleetWorker::spawn(index, fleet, mode, reports_tx.clone()))
            .collect();
        drop(reports_tx);

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            fleets = workers.len(),
            drones = owners.len(),
            mode = settings.mode.as_str(),
            "Tick coordinator started"
        );

        Ok(Self {
            run_id,
            settings,
            workers,
            owners,
            reports,
            next_tick: 1,
        })
    }

    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub const fn mode(&self) -> TickMode {
        self.settings.mode
    }

    pub const fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn fleet_names(&self) -> impl Iterator<Item = &str> {
        self.workers.iter().map(WorkerHandle::name)
    }

    pub fn fleet_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of the tick the next call to [`tick`](Self::tick) will run.
    pub const fn next_tick(&self) -> u64 {
        self.next_tick
    }

    /// Fleet that owns `drone_id`.
    pub fn owner_of(&self, drone_id: &str) -> Option<&str> {
        self.owners
            .get(drone_id)
            .map(|&index| self.workers[index].name())
    }

    /// Run one lockstep tick across every fleet.
    ///
    /// Returns only after every worker has reported tick `t`. The batch holds
    /// all snapshots ordered by fleet, then by drone.
    ///
    /// # Errors
    ///
    /// Fails outside lockstep mode, or if a worker exits or answers out of
    /// turn. The barrier cannot be resumed after an error.
    pub async fn tick(&mut self) -> Result<TickBatch, CoordinatorError> {
        if self.settings.mode != TickMode::Lockstep {
            return Err(CoordinatorError::FreeRunning);
        }

        let tick = self.next_tick;
        for worker in &self.workers {
            if worker.send(WorkerCommand::Tick(tick)).is_err() {
                return Err(CoordinatorError::WorkerExited {
                    fleet: worker.name().to_string(),
                    tick,
                });
            }
        }

        let mut collected: Vec<Option<Vec<DroneSnapshot>>> = vec![None; self.workers.len()];
        let mut outstanding = self.workers.len();

        while outstanding > 0 {
            match self.reports.recv().await {
                Some(WorkerReport::Batch {
                    fleet,
                    tick: reported,
                    snapshots,
                }) => {
                    if reported != tick {
                        return Err(CoordinatorError::UnexpectedTick {
                            fleet: self.fleet_name(fleet),
                            expected: tick,
                            got: reported,
                        });
                    }
                    if collected[fleet].replace(snapshots).is_none() {
                        outstanding -= 1;
                    }
                }
                Some(WorkerReport::Done { fleet }) => {
                    return Err(CoordinatorError::WorkerExited {
                        fleet: self.fleet_name(fleet),
                        tick,
                    });
                }
                None => return Err(CoordinatorError::WorkersGone),
            }
        }

        self.next_tick += 1;
        let snapshots: Vec<DroneSnapshot> = collected.into_iter().flatten().flatten().collect();
        debug!(tick, drones = snapshots.len(), "Tick barrier complete");

        Ok(TickBatch::new(self.run_id, tick, snapshots))
    }

    /// Wait for the next single-fleet batch in free-running mode.
    ///
    /// A worker that exits on its own is logged and skipped; the remaining
    /// fleets keep flying.
    ///
    /// # Errors
    ///
    /// Fails in lockstep mode, or once every worker has gone.
    pub async fn next_batch(&mut self) -> Result<TickBatch, CoordinatorError> {
        if self.settings.mode != TickMode::FreeRunning {
            return Err(CoordinatorError::Lockstep);
        }

        loop {
            match self.reports.recv().await {
                Some(report) => {
                    if let Some(batch) = self.accept_report(report) {
                        return Ok(batch);
                    }
                }
                None => return Err(CoordinatorError::WorkersGone),
            }
        }
    }

    /// Send a pause toggle to the fleet that owns the target drone.
    ///
    /// Returns the owning fleet's name. Delivery is fire-and-forget; the
    /// worker applies the toggle before its next tick.
    ///
    /// # Errors
    ///
    /// [`RoutingError::UnknownDrone`] if no fleet owns the id, or
    /// [`RoutingError::WorkerUnavailable`] if the owner has exited.
    pub fn route(&self, command: &ControlCommand) -> Result<&str, RoutingError> {
        let drone_id = command.target_drone_id.as_str();
        let index = *self
            .owners
            .get(drone_id)
            .ok_or_else(|| RoutingError::UnknownDrone(drone_id.to_string()))?;

        let worker = &self.workers[index];
        worker
            .send(WorkerCommand::TogglePause(drone_id.to_string()))
            .map_err(|_| RoutingError::WorkerUnavailable {
                fleet: worker.name().to_string(),
            })?;

        debug!(drone = drone_id, fleet = worker.name(), "Control message routed");
        Ok(worker.name())
    }

    /// Stop every worker and wait for its task. Returns how many reported done.
    pub async fn shutdown(self) -> usize {
        let Self {
            workers,
            mut reports,
            ..
        } = self;

        for worker in &workers {
            if worker.send(WorkerCommand::Stop).is_err() {
                debug!(fleet = worker.name(), "Fleet worker already stopped");
            }
        }

        let mut done = HashSet::new();
        while done.len() < workers.len() {
            match reports.recv().await {
                Some(WorkerReport::Done { fleet }) => {
                    done.insert(fleet);
                }
                Some(WorkerReport::Batch { fleet, tick, .. }) => {
                    debug!(fleet, tick, "Discarding in-flight batch");
                }
                None => break,
            }
        }

        for worker in workers {
            let name = worker.name().to_string();
            if let Err(err) = worker.into_task().await {
                warn!(fleet = %name, error = %err, "Fleet worker task failed");
            }
        }

        info!(stopped = done.len(), "Fleet workers stopped");
        done.len()
    }

    /// Drive the simulation until `shutdown` resolves, the tick limit is hit
    /// or the barrier fails.
    ///
    /// Sink failures and unroutable control messages are logged and counted;
    /// neither stops the run. Workers are always stopped before returning.
    ///
    /// # Errors
    ///
    /// Returns the barrier error if the coordinator lost its workers.
    pub async fn run<S, F>(
        mut self,
        sink: &mut S,
        mut control: mpsc::Receiver<ControlCommand>,
        shutdown: F,
    ) -> Result<RunSummary, CoordinatorError>
    where
        S: TelemetrySink + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let lockstep = self.settings.mode == TickMode::Lockstep;
        let fleets = u64::try_from(self.workers.len()).unwrap_or(u64::MAX);
        let limit = self.settings.max_ticks.map(|ticks| {
            if lockstep {
                ticks
            } else {
                ticks.saturating_mul(fleets)
            }
        });

        let mut ticker = interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut summary = RunSummary {
            run_id: self.run_id,
            ..RunSummary::default()
        };
        let mut control_open = true;
        let mut failure = None;

        info!(
            run_id = %self.run_id,
            mode = self.settings.mode.as_str(),
            sink = sink.name(),
            max_ticks = ?self.settings.max_ticks,
            "Simulation running"
        );

        loop {
            if limit.is_some_and(|limit| summary.ticks >= limit) {
                info!(ticks = summary.ticks, "Tick limit reached");
                break;
            }

            let event = tokio::select! {
                biased;

                () = &mut shutdown => Event::Shutdown,
                command = control.recv(), if control_open => Event::Control(command),
                _ = ticker.tick(), if lockstep => Event::TickDue,
                report = self.reports.recv(), if !lockstep => Event::Report(report),
            };

            match event {
                Event::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                Event::Control(Some(command)) => match self.route(&command) {
                    Ok(_) => summary.commands_routed += 1,
                    Err(err) => {
                        warn!(error = %err, "Control message dropped");
                        summary.routing_errors += 1;
                    }
                },
                Event::Control(None) => {
                    debug!("Control channel closed");
                    control_open = false;
                }
                Event::TickDue => match self.tick().await {
                    Ok(batch) => {
                        summary.ticks += 1;
                        deliver(sink, &batch, &mut summary).await;
                    }
                    Err(err) => {
                        error!(error = %err, "Tick barrier failed");
                        failure = Some(err);
                        break;
                    }
                },
                Event::Report(Some(report)) => {
                    if let Some(batch) = self.accept_report(report) {
                        summary.ticks += 1;
                        deliver(sink, &batch, &mut summary).await;
                    }
                }
                Event::Report(None) => {
                    error!("All fleet workers have exited");
                    failure = Some(CoordinatorError::WorkersGone);
                    break;
                }
            }
        }

        summary.workers_stopped = self.shutdown().await;

        if let Some(err) = failure {
            return Err(err);
        }

        info!(
            ticks = summary.ticks,
            delivered = summary.batches_delivered,
            failed = summary.delivery_failures,
            routed = summary.commands_routed,
            "Simulation finished"
        );
        Ok(summary)
    }

    fn accept_report(&self, report: WorkerReport) -> Option<TickBatch> {
        match report {
            WorkerReport::Batch {
                tick, snapshots, ..
            } => Some(TickBatch::new(self.run_id, tick, snapshots)),
            WorkerReport::Done { fleet } => {
                warn!(fleet = %self.fleet_name(fleet), "Fleet worker exited");
                None
            }
        }
    }

    fn fleet_name(&self, index: usize) -> String {
        self.workers
            .get(index)
            .map_or_else(|| format!("#{index}"), |worker| worker.name().to_string())
    }
}

async fn deliver<S>(sink: &mut S, batch: &TickBatch, summary: &mut RunSummary)
where
    S: TelemetrySink + ?Sized,
{
    match sink.deliver(batch).await {
        Ok(()) => summary.batches_delivered += 1,
        Err(err) => {
            summary.delivery_failures += 1;
            warn!(
                tick = batch.tick_number,
                records = batch.len(),
                sink = sink.name(),
                error = %err,
                "Telemetry batch not delivered"
            );
        }
    }
}
