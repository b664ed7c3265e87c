//! # Drone Simulator
//!
//! Multi-airport drone delivery simulator producing per-tick telemetry.
//!
//! ## Features
//!
//! - Straight-line drone kinematics with exact waypoint arrival
//! - Random round-trip delivery routes inside each airport's boundary
//! - One worker task per fleet, clocked in lockstep or free-running
//! - Pause/resume control routed to the owning fleet by drone id
//! - Pluggable telemetry sinks (log, channel, broadcast, HTTP)

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod drone;
pub mod error;
pub mod fleet;
pub mod pause;
pub mod route;
pub mod sink;
pub mod snapshot;
pub mod worker;

pub use config::{SimulatorConfig, SinkKind};
pub use coordinator::{CoordinatorSettings, RunSummary, TickCoordinator, TickMode};
pub use drone::{Advance, Drone};
pub use error::{ConfigurationError, CoordinatorError, FleetRejection, RoutingError, SinkError};
pub use fleet::Fleet;
pub use pause::{PauseRegistry, PauseState};
pub use route::{RouteGenerator, generate_route};
pub use sink::{BroadcastSink, ChannelSink, HttpSink, LogSink, TelemetrySink};
pub use snapshot::{DroneSnapshot, TickBatch, fleet_key};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
