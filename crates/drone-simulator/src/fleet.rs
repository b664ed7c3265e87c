//! Airport-level simulation: one fleet of drones sharing a home and a boundary.

use drone_domain::{Boundary, Coordinate, FleetConfig};
use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::drone::{Advance, Drone};
use crate::error::{ConfigurationError, FleetRejection, RoutingError};
use crate::pause::{PauseRegistry, PauseState};
use crate::route::RouteGenerator;
use crate::snapshot::DroneSnapshot;

/// A fleet of drones flying round trips out of one airport.
///
/// The airport sits at the centre of the boundary. Drones are named
/// `{fleet}-{index}` and keep their name for the life of the fleet; a drone
/// that has come home is replaced by a fresh one under the same name.
#[derive(Debug)]
pub struct Fleet {
    name: String,
    home: Coordinate,
    boundary: Boundary,
    speed: f64,
    drones: Vec<Drone>,
    routes: RouteGenerator<StdRng>,
    paused: PauseRegistry,
}

impl Fleet {
    /// Build a fleet from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidFleet`] for a non-positive speed,
    /// negative counts, an inverted hop range or an empty boundary.
    pub fn new(config: &FleetConfig, speed: f64, rng: StdRng) -> Result<Self, ConfigurationError> {
        let invalid = |reason| ConfigurationError::InvalidFleet {
            fleet: config.name.clone(),
            reason,
        };

        if !(speed.is_finite() && speed > 0.0) {
            return Err(invalid(FleetRejection::Speed(speed)));
        }

        let drone_count = non_negative("drone count", config.drone_count).map_err(invalid)?;
        let min_hops = non_negative("minimum deliveries", config.min_deliveries).map_err(invalid)?;
        let max_hops = non_negative("maximum deliveries", config.max_deliveries).map_err(invalid)?;

        let boundary = config.boundary();
        if !boundary.is_finite() || boundary.is_empty() {
            return Err(invalid(FleetRejection::EmptyBoundary));
        }

        let home = boundary.centre();
        let mut routes =
            RouteGenerator::new(home, boundary, min_hops, max_hops, rng).map_err(invalid)?;

        let drones = (0..drone_count)
            .map(|i| Drone::new(format!("{}-{i}", config.name), home, routes.generate(), speed))
            .collect();

        debug!(
            fleet = %config.name,
            drones = drone_count,
            home_lat = home.lat,
            home_lon = home.lon,
            "Fleet initialised"
        );

        Ok(Self {
            name: config.name.clone(),
            home,
            boundary,
            speed,
            drones,
            routes,
            paused: PauseRegistry::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn home(&self) -> Coordinate {
        self.home
    }

    pub const fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub const fn speed(&self) -> f64 {
        self.speed
    }

    pub fn drones(&self) -> &[Drone] {
        &self.drones
    }

    pub fn len(&self) -> usize {
        self.drones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drones.is_empty()
    }

    pub fn drone(&self, drone_id: &str) -> Option<&Drone> {
        self.drones.iter().find(|d| d.id() == drone_id)
    }

    pub fn drone_ids(&self) -> impl Iterator<Item = &str> {
        self.drones.iter().map(Drone::id)
    }

    pub fn owns(&self, drone_id: &str) -> bool {
        self.drone(drone_id).is_some()
    }

    pub const fn paused(&self) -> &PauseRegistry {
        &self.paused
    }

    /// Pause or resume one of this fleet's drones.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::UnknownDrone`] if the fleet has no such drone.
    pub fn toggle_pause(&mut self, drone_id: &str) -> Result<PauseState, RoutingError> {
        if !self.owns(drone_id) {
            return Err(RoutingError::UnknownDrone(drone_id.to_string()));
        }
        Ok(self.paused.toggle(drone_id))
    }

    /// Advance every drone one tick and report all of them.
    ///
    /// Paused drones neither move nor recycle but are still reported at
    /// their frozen position. A drone back home is swapped for a freshly
    /// routed one instead of moving this tick.
    pub fn tick(&mut self, tick_number: u64) -> Vec<DroneSnapshot> {
        for drone in &mut self.drones {
            if self.paused.is_paused(drone.id()) {
                continue;
            }

            if drone.has_returned_to(self.home) {
                *drone = drone.recycled(self.home, self.routes.generate());
                debug!(
                    fleet = %self.name,
                    drone = drone.id(),
                    waypoints = drone.route().len(),
                    "Drone recycled with new route"
                );
                continue;
            }

            if let Advance::Arrived { waypoint } = drone.advance_one_tick() {
                trace!(fleet = %self.name, drone = drone.id(), waypoint, "Waypoint reached");
            }
        }

        self.snapshots(tick_number)
    }

    /// Current state of every drone, in fleet order.
    pub fn snapshots(&self, tick_number: u64) -> Vec<DroneSnapshot> {
        self.drones
            .iter()
            .map(|drone| {
                let paused = self.paused.is_paused(drone.id());
                DroneSnapshot::capture(&self.name, drone, paused, tick_number)
            })
            .collect()
    }
}

fn non_negative(field: &'static str, value: i64) -> Result<usize, FleetRejection> {
    usize::try_from(value).map_err(|_| FleetRejection::NegativeCount { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use drone_domain::distance;
    use rand::SeedableRng;

    fn config(drones: i64, min: i64, max: i64) -> FleetConfig {
        FleetConfig {
            name: "airport-A".to_string(),
            home_region_ne: Coordinate::new(10.0, 4.0),
            home_region_sw: Coordinate::new(7.0, 13.0),
            drone_count: drones,
            min_deliveries: min,
            max_deliveries: max,
        }
    }

    fn fleet(drones: i64, min: i64, max: i64, speed: f64) -> Fleet {
        Fleet::new(&config(drones, min, max), speed, StdRng::seed_from_u64(2024)).unwrap()
    }

    fn rejection(result: Result<Fleet, ConfigurationError>) -> FleetRejection {
        match result {
            Err(ConfigurationError::InvalidFleet { reason, .. }) => reason,
            other => panic!("expected InvalidFleet, got {other:?}"),
        }
    }

    #[test]
    fn test_creates_requested_drones() {
        let config = FleetConfig {
            name: "Airport-A".to_string(),
            home_region_ne: Coordinate::new(10.0, 20.0),
            home_region_sw: Coordinate::new(5.0, -12.0),
            drone_count: 5,
            min_deliveries: 5,
            max_deliveries: 10,
        };
        let fleet = Fleet::new(&config, 1.0, StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(fleet.len(), 5);
        assert_eq!(
            fleet.drone_ids().collect::<Vec<_>>(),
            ["Airport-A-0", "Airport-A-1", "Airport-A-2", "Airport-A-3", "Airport-A-4"]
        );
        assert_eq!(fleet.home(), Coordinate::new(7.5, 4.0));
    }

    #[test]
    fn test_every_route_ends_at_home() {
        let fleet = fleet(20, 1, 6, 0.5);

        for drone in fleet.drones() {
            assert_eq!(drone.route().last(), Some(&fleet.home()));
            assert_eq!(drone.position(), fleet.home());
            assert_eq!(drone.cursor(), 0);
        }
    }

    #[test]
    fn test_rejects_bad_speed() {
        for speed in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = Fleet::new(&config(1, 1, 1), speed, StdRng::seed_from_u64(0));
            assert!(matches!(rejection(result), FleetRejection::Speed(_)));
        }
    }

    #[test]
    fn test_rejects_negative_counts() {
        let result = Fleet::new(&config(-1, 1, 1), 1.0, StdRng::seed_from_u64(0));
        assert_eq!(
            rejection(result),
            FleetRejection::NegativeCount {
                field: "drone count",
                value: -1
            }
        );

        let result = Fleet::new(&config(1, -3, 1), 1.0, StdRng::seed_from_u64(0));
        assert!(matches!(rejection(result), FleetRejection::NegativeCount { .. }));
    }

    #[test]
    fn test_rejects_inverted_hop_range() {
        let result = Fleet::new(&config(1, 5, 2), 1.0, StdRng::seed_from_u64(0));
        assert_eq!(rejection(result), FleetRejection::HopRange { min: 5, max: 2 });
    }

    #[test]
    fn test_rejects_empty_boundary() {
        let mut flat = config(1, 1, 1);
        flat.home_region_sw = flat.home_region_ne;

        let result = Fleet::new(&flat, 1.0, StdRng::seed_from_u64(0));
        assert_eq!(rejection(result), FleetRejection::EmptyBoundary);
    }

    #[test]
    fn test_round_trip_returns_home() {
        let mut fleet = fleet(1, 1, 1, 1.0);
        let drone = &fleet.drones()[0];
        let dist = distance(drone.position(), drone.route()[0]);
        let ticks = 2 * dist.ceil() as u64 + 1;

        for tick in 1..=ticks {
            fleet.tick(tick);
        }

        assert_eq!(fleet.drones()[0].position(), fleet.home());
    }

    #[test]
    fn test_finished_drone_is_recycled() {
        let mut fleet = fleet(1, 2, 3, 0.75);
        let original = fleet.drones()[0].clone();

        let mut tick = 0;
        while !fleet.drones()[0].is_finished() {
            tick += 1;
            fleet.tick(tick);
            assert!(tick < 1_000, "drone never finished its route");
        }
        assert!(fleet.drones()[0].has_returned_to(fleet.home()));

        let snapshots = fleet.tick(tick + 1);
        let recycled = &fleet.drones()[0];

        assert_eq!(recycled.id(), original.id());
        assert_eq!(recycled.cursor(), 0);
        assert_eq!(recycled.position(), fleet.home());
        assert_eq!(recycled.route().last(), Some(&fleet.home()));
        assert_eq!(snapshots[0].cursor(), 0);
    }

    #[test]
    fn test_tick_reports_every_drone_in_order() {
        let mut fleet = fleet(6, 1, 3, 0.2);
        let ids: Vec<String> = fleet.drone_ids().map(str::to_string).collect();
        fleet.toggle_pause("airport-A-3").unwrap();

        for tick in 1..=40 {
            let snapshots = fleet.tick(tick);
            assert_eq!(fleet.len(), 6);
            assert_eq!(snapshots.len(), 6);

            let reported: Vec<&str> = snapshots.iter().map(DroneSnapshot::drone_id).collect();
            assert_eq!(reported, ids);
            assert!(snapshots.iter().all(|s| s.tick_number == tick));
        }
    }

    #[test]
    fn test_paused_drone_is_frozen_until_toggled() {
        let mut fleet = fleet(3, 2, 2, 0.01);
        fleet.tick(1);

        let frozen = fleet.drone("airport-A-1").unwrap().position();
        assert_eq!(fleet.toggle_pause("airport-A-1"), Ok(PauseState::Paused));

        for tick in 2..=5 {
            let snapshots = fleet.tick(tick);
            assert_eq!(snapshots[1].position(), frozen);
            assert!(snapshots[1].paused);
            assert!(!snapshots[0].paused);
        }

        assert_eq!(fleet.toggle_pause("airport-A-1"), Ok(PauseState::Resumed));
        let snapshots = fleet.tick(6);
        assert_ne!(snapshots[1].position(), frozen);
        assert!(!snapshots[1].paused);
    }

    #[test]
    fn test_toggle_unknown_drone() {
        let mut fleet = fleet(2, 1, 1, 1.0);

        assert_eq!(
            fleet.toggle_pause("airport-B-0"),
            Err(RoutingError::UnknownDrone("airport-B-0".to_string()))
        );
        assert!(fleet.paused().is_empty());
    }
}
