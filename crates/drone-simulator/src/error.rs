//! # Simulator Error Types
//!
//! Configuration problems are fatal and stop a fleet from starting. Routing
//! and sink failures are recovered where they happen: logged, counted and
//! then the simulation carries on.

use drone_domain::DomainError;
use thiserror::Error;

/// Why a single fleet's parameters were refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FleetRejection {
    #[error("drone speed must be positive and finite, got {0}")]
    Speed(f64),

    #[error("operating boundary is empty or not finite")]
    EmptyBoundary,

    #[error("{field} must not be negative, got {value}")]
    NegativeCount { field: &'static str, value: i64 },

    #[error("minimum hops {min} exceeds maximum hops {max}")]
    HopRange { min: usize, max: usize },
}

/// Fatal setup errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Fleet '{fleet}': {reason}")]
    InvalidFleet { fleet: String, reason: FleetRejection },

    #[error("Fleet name '{0}' is configured more than once")]
    DuplicateFleet(String),

    #[error("No fleets configured")]
    NoFleets,

    #[error("Tick interval must be greater than zero")]
    ZeroTickInterval,

    #[error("Invalid value for {key}: '{value}'")]
    InvalidSetting { key: &'static str, value: String },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// A control message could not be routed to a fleet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("No fleet owns drone '{0}'")]
    UnknownDrone(String),

    #[error("Fleet '{fleet}' is no longer accepting commands")]
    WorkerUnavailable { fleet: String },
}

/// A tick batch could not be handed to the downstream sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP delivery failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sink rejected batch with status {status}")]
    Rejected { status: u16 },

    #[error("Sink channel is closed")]
    Closed,

    #[error("No subscribers are listening")]
    NoSubscribers,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of the tick barrier itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("All fleet workers have exited")]
    WorkersGone,

    #[error("Fleet '{fleet}' exited during tick {tick}")]
    WorkerExited { fleet: String, tick: u64 },

    #[error("Fleet '{fleet}' reported tick {got} while tick {expected} was in progress")]
    UnexpectedTick { fleet: String, expected: u64, got: u64 },

    #[error("Lockstep ticking is not available in free-running mode")]
    FreeRunning,

    #[error("Free-running batches are not available in lockstep mode")]
    Lockstep,
}
