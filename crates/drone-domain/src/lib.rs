//! # Drone Delivery Simulator - Domain Model
//!
//! Value objects and wire types shared by the simulation core and the
//! boundary adapters: planar coordinates, airport (fleet) configuration,
//! operator control commands and flattened telemetry records.
//!
//! Positions are planar approximations of latitude/longitude. Distances are
//! Euclidean, not great-circle.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// A latitude/longitude pair.
///
/// Equality is bit-for-bit on both components, so a drone snapped onto a
/// waypoint compares equal to it and `-0.0` differs from `0.0`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(rename = "Lat", alias = "lat")]
    pub lat: f64,
    #[serde(rename = "Lon", alias = "lon")]
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Planar Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance(*self, *other)
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.lat.to_bits() == other.lat.to_bits() && self.lon.to_bits() == other.lon.to_bits()
    }
}

impl Eq for Coordinate {}

impl Hash for Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lat.to_bits().hash(state);
        self.lon.to_bits().hash(state);
    }
}

/// `hypot(Δlat, Δlon)`. NaN and infinite inputs propagate.
#[must_use]
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    (a.lat - b.lat).hypot(a.lon - b.lon)
}

/// Operating rectangle of an airport, given by two opposite corners.
///
/// The corners are kept in the order they were configured; nothing here
/// assumes `north_west` is numerically larger than `south_east`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boundary {
    pub north_west: Coordinate,
    pub south_east: Coordinate,
}

impl Boundary {
    pub const fn new(north_west: Coordinate, south_east: Coordinate) -> Self {
        Self {
            north_west,
            south_east,
        }
    }

    /// Mid point of the rectangle, where the airport sits.
    #[must_use]
    pub fn centre(&self) -> Coordinate {
        let nw = self.north_west;
        let se = self.south_east;
        Coordinate::new(
            ((nw.lat - se.lat) / 2.0) + se.lat,
            ((nw.lon - se.lon) / 2.0) + se.lon,
        )
    }

    /// True when either axis spans no interval at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.north_west.lat == self.south_east.lat || self.north_west.lon == self.south_east.lon
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.north_west.is_finite() && self.south_east.is_finite()
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Airports used when no configuration is supplied.
pub const DEFAULT_AIRPORTS_JSON: &str = r#"[{
    "name": "air1",
    "NE": {"lat": -33.8073, "lon": 151.1606},
    "SW": {"lat": -33.8972, "lon": 151.2738},
    "drones": 2,
    "minDel": 1,
    "maxDel": 1
}]"#;

/// One airport as supplied by the operator.
///
/// Accepts both the short keys used by existing deployments (`NE`, `drones`,
/// `minDel`) and the long camelCase names. Counts are signed so that a
/// negative value reaches validation instead of failing as a type error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    pub name: String,

    #[serde(rename = "NE", alias = "homeRegionNE")]
    pub home_region_ne: Coordinate,

    #[serde(rename = "SW", alias = "homeRegionSW")]
    pub home_region_sw: Coordinate,

    #[serde(rename = "drones", alias = "droneCount")]
    pub drone_count: i64,

    #[serde(rename = "minDel", alias = "minDeliveries")]
    pub min_deliveries: i64,

    #[serde(rename = "maxDel", alias = "maxDeliveries")]
    pub max_deliveries: i64,
}

impl FleetConfig {
    /// The NE corner plays the north-west role and SW the south-east role
    /// when drawing waypoints.
    #[must_use]
    pub fn boundary(&self) -> Boundary {
        Boundary::new(self.home_region_ne, self.home_region_sw)
    }
}

/// Parse a JSON list of airports.
pub fn parse_fleet_configs(json: &str) -> Result<Vec<FleetConfig>, DomainError> {
    serde_json::from_str(json).map_err(DomainError::FleetConfig)
}

// =============================================================================
// CONTROL
// =============================================================================

/// Toggle the paused state of one drone.
///
/// There are no separate pause and resume verbs: a command for a running
/// drone pauses it, a command for a paused drone resumes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlCommand {
    pub target_drone_id: String,
}

/// Shapes a control message may arrive in.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ControlMessage {
    Direct(ControlCommand),
    Client {
        #[serde(default, rename = "commands")]
        _command: Option<String>,
        message: HashMap<String, String>,
    },
}

impl ControlCommand {
    pub fn toggle(target_drone_id: impl Into<String>) -> Self {
        Self {
            target_drone_id: target_drone_id.into(),
        }
    }

    /// Parse either `{"targetDroneId": "air1-0"}` or the browser client
    /// shape `{"commands": "stop", "message": {"drone": "air1-0"}}`.
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let message: ControlMessage =
            serde_json::from_str(text).map_err(DomainError::ControlMessage)?;

        let target = match message {
            ControlMessage::Direct(command) => command.target_drone_id,
            ControlMessage::Client { message, .. } => message
                .get("drone")
                .cloned()
                .ok_or(DomainError::MissingDroneTarget)?,
        };

        let target = target.trim();
        if target.is_empty() {
            return Err(DomainError::MissingDroneTarget);
        }

        Ok(Self::toggle(target))
    }
}

// =============================================================================
// TELEMETRY
// =============================================================================

/// Flattened per-drone sample handed to telemetry sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub fleet_name: String,
    pub drone_id: String,
    pub lat: f64,
    pub lon: f64,
    pub tick_number: u64,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Domain-level errors
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid fleet configuration JSON: {0}")]
    FleetConfig(#[source] serde_json::Error),

    #[error("Invalid control message: {0}")]
    ControlMessage(#[source] serde_json::Error),

    #[error("Control message does not name a drone")]
    MissingDroneTarget,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::Fake;

    fn random_coordinate() -> Coordinate {
        Coordinate::new(
            (-90.0_f64..90.0_f64).fake::<f64>(),
            (-180.0_f64..180.0_f64).fake::<f64>(),
        )
    }

    #[test]
    fn test_distance_is_symmetric() {
        for _ in 0..200 {
            let a = random_coordinate();
            let b = random_coordinate();
            assert_eq!(distance(a, b), distance(b, a));
            assert_eq!(distance(a, a), 0.0);
        }
    }

    #[test]
    fn test_distance_is_planar() {
        let a = Coordinate::new(3.0, 3.0);
        let b = Coordinate::new(6.0, 7.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }

    #[test]
    fn test_distance_propagates_nan() {
        let a = Coordinate::new(f64::NAN, 0.0);
        assert!(distance(a, Coordinate::new(1.0, 1.0)).is_nan());
    }

    #[test]
    fn test_equality_is_bitwise() {
        assert_eq!(Coordinate::new(9.0, 5.0), Coordinate::new(9.0, 5.0));
        assert_ne!(Coordinate::new(0.0, 1.0), Coordinate::new(-0.0, 1.0));

        let nan = Coordinate::new(f64::NAN, 1.0);
        assert_eq!(nan, nan);
    }

    #[test]
    fn test_boundary_centre() {
        let boundary = Boundary::new(Coordinate::new(10.0, 4.0), Coordinate::new(7.0, 13.0));
        assert_eq!(boundary.centre(), Coordinate::new(8.5, 8.5));
        assert!(!boundary.is_empty());

        let flat = Boundary::new(Coordinate::new(1.0, 4.0), Coordinate::new(1.0, 13.0));
        assert!(flat.is_empty());
    }

    #[test]
    fn test_parse_default_airports() {
        let airports = parse_fleet_configs(DEFAULT_AIRPORTS_JSON).unwrap();
        assert_eq!(airports.len(), 1);
        assert_eq!(airports[0].name, "air1");
        assert_eq!(airports[0].home_region_ne, Coordinate::new(-33.8073, 151.1606));
        assert_eq!(airports[0].drone_count, 2);
    }

    #[test]
    fn test_parse_long_key_airports() {
        let json = r#"[{
            "name": "air2",
            "homeRegionNE": {"Lat": 10.0, "Lon": 2.0},
            "homeRegionSW": {"Lat": 3.0, "Lon": 15.0},
            "droneCount": 5,
            "minDeliveries": 5,
            "maxDeliveries": 10
        }]"#;

        let airports = parse_fleet_configs(json).unwrap();
        assert_eq!(airports[0].home_region_sw, Coordinate::new(3.0, 15.0));
        assert_eq!(airports[0].max_deliveries, 10);
        assert_eq!(airports[0].boundary().centre(), Coordinate::new(6.5, 8.5));
    }

    #[test]
    fn test_parse_malformed_airports() {
        let err = parse_fleet_configs(r#"[{"name": "air1"}]"#).unwrap_err();
        assert!(matches!(err, DomainError::FleetConfig(_)));
    }

    #[test]
    fn test_parse_control_command_shapes() {
        let direct = ControlCommand::parse(r#"{"targetDroneId": "air1-0"}"#).unwrap();
        assert_eq!(direct, ControlCommand::toggle("air1-0"));

        let client =
            ControlCommand::parse(r#"{"commands": "stop", "message": {"drone": "air1-1"}}"#)
                .unwrap();
        assert_eq!(client.target_drone_id, "air1-1");
    }

    #[test]
    fn test_parse_control_command_without_target() {
        let err = ControlCommand::parse(r#"{"commands": "stop", "message": {}}"#).unwrap_err();
        assert!(matches!(err, DomainError::MissingDroneTarget));

        let err = ControlCommand::parse(r#"{"targetDroneId": "  "}"#).unwrap_err();
        assert!(matches!(err, DomainError::MissingDroneTarget));

        let err = ControlCommand::parse("not json").unwrap_err();
        assert!(matches!(err, DomainError::ControlMessage(_)));
    }

    #[test]
    fn test_telemetry_record_keys() {
        let record = TelemetryRecord {
            fleet_name: "air1".to_string(),
            drone_id: "air1-0".to_string(),
            lat: 1.5,
            lon: -2.5,
            tick_number: 7,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["fleetName"], "air1");
        assert_eq!(value["droneId"], "air1-0");
        assert_eq!(value["tickNumber"], 7);
    }
}
