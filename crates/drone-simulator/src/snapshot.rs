//! Per-tick drone snapshots and the batches handed to sinks.

use chrono::{DateTime, Utc};
use drone_domain::{Coordinate, TelemetryRecord};
use serde::Serialize;
use uuid::Uuid;

use crate::drone::Drone;

/// Reported state of one drone for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DroneSnapshot {
    pub fleet_name: String,
    pub tick_number: u64,
    pub paused: bool,
    pub drone: Drone,
}

impl DroneSnapshot {
    pub fn capture(fleet_name: &str, drone: &Drone, paused: bool, tick_number: u64) -> Self {
        Self {
            fleet_name: fleet_name.to_string(),
            tick_number,
            paused,
            drone: drone.clone(),
        }
    }

    pub fn drone_id(&self) -> &str {
        self.drone.id()
    }

    pub const fn position(&self) -> Coordinate {
        self.drone.position()
    }

    pub const fn cursor(&self) -> usize {
        self.drone.cursor()
    }

    pub fn route(&self) -> &[Coordinate] {
        self.drone.route()
    }

    /// Flattened record for sinks that only want positions.
    pub fn telemetry_record(&self) -> TelemetryRecord {
        let position = self.position();
        TelemetryRecord {
            fleet_name: self.fleet_name.clone(),
            drone_id: self.drone_id().to_string(),
            lat: position.lat,
            lon: position.lon,
            tick_number: self.tick_number,
        }
    }
}

/// Message key used for a fleet's records on keyed transports.
pub fn fleet_key(fleet_name: &str) -> String {
    format!("Airport-{fleet_name}")
}

/// Everything produced for one tick, delivered to a sink as one unit.
///
/// In lockstep mode a batch holds every fleet's snapshots, ordered by fleet
/// then by drone. In free-running mode a batch holds a single fleet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickBatch {
    pub run_id: Uuid,
    pub tick_number: u64,
    pub emitted_at: DateTime<Utc>,
    pub snapshots: Vec<DroneSnapshot>,
}

impl TickBatch {
    pub fn new(run_id: Uuid, tick_number: u64, snapshots: Vec<DroneSnapshot>) -> Self {
        Self {
            run_id,
            tick_number,
            emitted_at: Utc::now(),
            snapshots,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn telemetry_records(&self) -> Vec<TelemetryRecord> {
        self.snapshots.iter().map(DroneSnapshot::telemetry_record).collect()
    }

    /// Snapshot for a drone id, if the batch contains it.
    pub fn find(&self, drone_id: &str) -> Option<&DroneSnapshot> {
        self.snapshots.iter().find(|s| s.drone_id() == drone_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> DroneSnapshot {
        let drone = Drone::new(
            "air1-0",
            Coordinate::new(3.0, 3.0),
            vec![Coordinate::new(9.0, 5.0)],
            5.0,
        );
        DroneSnapshot::capture("air1", &drone, false, 12)
    }

    #[test]
    fn test_telemetry_record() {
        let record = snapshot().telemetry_record();

        assert_eq!(record.fleet_name, "air1");
        assert_eq!(record.drone_id, "air1-0");
        assert_eq!((record.lat, record.lon), (3.0, 3.0));
        assert_eq!(record.tick_number, 12);
    }

    #[test]
    fn test_snapshot_nests_canonical_record() {
        let value = serde_json::to_value(snapshot()).unwrap();

        assert_eq!(value["fleetName"], "air1");
        assert_eq!(value["tickNumber"], 12);
        assert_eq!(value["drone"]["Name"], "air1-0");
        assert_eq!(value["drone"]["NextDestination"], 0);
        assert_eq!(value["drone"]["CurrentPosition"]["Lat"], 3.0);
    }

    #[test]
    fn test_batch_lookup() {
        let batch = TickBatch::new(Uuid::new_v4(), 12, vec![snapshot()]);

        assert_eq!(batch.len(), 1);
        assert!(batch.find("air1-0").is_some());
        assert!(batch.find("air1-9").is_none());
        assert_eq!(batch.telemetry_records().len(), 1);
        assert_eq!(fleet_key("air1"), "Airport-air1");
    }
}
