//! Random round-trip route generation.

use drone_domain::{Boundary, Coordinate};
use rand::Rng;
use rand::rngs::StdRng;

use crate::error::FleetRejection;

/// Draw a round trip: `min_hops..=max_hops` random waypoints inside
/// `boundary`, then back to `home`.
///
/// Each axis is drawn as `(nw - se) * U[0, 1) + se`, so the corners may be
/// given in either order. The result always ends with `home` and is never
/// empty.
///
/// # Panics
///
/// Panics if `min_hops > max_hops`. [`RouteGenerator::new`] rejects that
/// case up front.
pub fn generate_route<R: Rng + ?Sized>(
    rng: &mut R,
    home: Coordinate,
    boundary: &Boundary,
    min_hops: usize,
    max_hops: usize,
) -> Vec<Coordinate> {
    let nw = boundary.north_west;
    let se = boundary.south_east;

    let hops = rng.gen_range(min_hops..=max_hops);
    let mut route = Vec::with_capacity(hops + 1);

    for _ in 0..hops {
        let lat = (nw.lat - se.lat) * rng.r#gen::<f64>() + se.lat;
        let lon = (nw.lon - se.lon) * rng.r#gen::<f64>() + se.lon;
        route.push(Coordinate::new(lat, lon));
    }

    route.push(home);
    route
}

/// Route source for one fleet.
///
/// Owns its random source so a seeded generator always yields the same
/// sequence of routes.
#[derive(Debug, Clone)]
pub struct RouteGenerator<R = StdRng> {
    home: Coordinate,
    boundary: Boundary,
    min_hops: usize,
    max_hops: usize,
    rng: R,
}

impl<R: Rng> RouteGenerator<R> {
    /// Create a generator for routes starting and ending at `home`.
    pub fn new(
        home: Coordinate,
        boundary: Boundary,
        min_hops: usize,
        max_hops: usize,
        rng: R,
    ) -> Result<Self, FleetRejection> {
        if min_hops > max_hops {
            return Err(FleetRejection::HopRange {
                min: min_hops,
                max: max_hops,
            });
        }

        Ok(Self {
            home,
            boundary,
            min_hops,
            max_hops,
            rng,
        })
    }

    /// Generate the next route.
    pub fn generate(&mut self) -> Vec<Coordinate> {
        generate_route(
            &mut self.rng,
            self.home,
            &self.boundary,
            self.min_hops,
            self.max_hops,
        )
    }

    pub const fn home(&self) -> Coordinate {
        self.home
    }

    pub const fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub const fn hop_range(&self) -> (usize, usize) {
        (self.min_hops, self.max_hops)
    }
}
