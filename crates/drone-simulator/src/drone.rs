//! Kinematics of a single delivery drone.

use drone_domain::{Coordinate, distance};
use serde::Serialize;

/// Outcome of one kinematic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved exactly `speed` along the leg toward the current waypoint.
    Moved,
    /// Snapped onto the waypoint at this route index; the cursor moved past it.
    Arrived { waypoint: usize },
    /// Every waypoint has been reached, nothing left to fly to.
    Finished,
}

/// One vehicle flying a fixed route.
///
/// Serializes to the canonical telemetry record:
/// `{"CurrentPosition":{..},"Destinations":[..],"NextDestination":0,"Speed":5.0,"Name":".."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drone {
    #[serde(rename = "CurrentPosition")]
    position: Coordinate,
    #[serde(rename = "Destinations")]
    route: Vec<Coordinate>,
    #[serde(rename = "NextDestination")]
    cursor: usize,
    #[serde(rename = "Speed")]
    speed: f64,
    #[serde(rename = "Name")]
    id: String,
}

impl Drone {
    /// Create a drone at `position` that will fly `route` in order.
    pub fn new(id: impl Into<String>, position: Coordinate, route: Vec<Coordinate>, speed: f64) -> Self {
        Self {
            position,
            route,
            cursor: 0,
            speed,
            id: id.into(),
        }
    }

    /// A fresh drone that keeps this drone's name and speed but starts over
    /// at `home` with a new route.
    #[must_use]
    pub fn recycled(&self, home: Coordinate, route: Vec<Coordinate>) -> Self {
        Self::new(self.id.clone(), home, route, self.speed)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn position(&self) -> Coordinate {
        self.position
    }

    pub fn route(&self) -> &[Coordinate] {
        &self.route
    }

    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// The waypoint currently being flown to, if any remain.
    pub fn target(&self) -> Option<Coordinate> {
        self.route.get(self.cursor).copied()
    }

    /// Distance left on the current leg.
    pub fn remaining_distance(&self) -> Option<f64> {
        self.target().map(|target| distance(self.position, target))
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.route.len()
    }

    /// True once the drone has flown somewhere and is back on `home`.
    pub fn has_returned_to(&self, home: Coordinate) -> bool {
        self.position == home && self.cursor > 0
    }

    /// Advance one tick toward the current waypoint.
    ///
    /// A step that would reach or pass the waypoint lands exactly on it and
    /// moves the cursor to the next one. Past the final waypoint this is a
    /// no-op.
    pub fn advance_one_tick(&mut self) -> Advance {
        let Some(target) = self.target() else {
            return Advance::Finished;
        };

        let remaining = distance(self.position, target);
        if self.speed >= remaining {
            self.position = target;
            let waypoint = self.cursor;
            self.cursor += 1;
            return Advance::Arrived { waypoint };
        }

        // Per-axis step is speed / (d / Δ), not speed * Δ / d; the two round differently.
        self.position = Coordinate::new(
            self.position.lat + self.speed / (remaining / (target.lat - self.position.lat)),
            self.position.lon + self.speed / (remaining / (target.lon - self.position.lon)),
        );
        Advance::Moved
    }

    /// Canonical JSON record for this drone.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
