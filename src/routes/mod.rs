// Routes module - the geolocated hop list returned for one trace

pub mod assembler;

use serde::Serialize;
use std::collections::HashSet;

use crate::geo::HopLocation;

const EARTH_RADIUS_KM: f64 = 6371.0;
const MILES_PER_KM: f64 = 0.621371;

/// Resolved hops in path order, closest to this server first.
///
/// Hops that could not be geolocated are absent, so a hop's index is not
/// necessarily its hop number in the trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Route {
    pub hops: Vec<HopLocation>,
}

impl Route {
    pub fn new(hops: Vec<HopLocation>) -> Self {
        Route { hops }
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn summary(&self) -> RouteSummary {
        let countries: HashSet<&str> = self.hops.iter().map(|h| h.country.as_str()).collect();
        // fold from +0.0; an empty f64 sum is -0.0
        let distance_km = self
            .hops
            .windows(2)
            .map(|pair| haversine_km(&pair[0], &pair[1]))
            .fold(0.0, |acc, d| acc + d);

        RouteSummary {
            hop_count: self.hops.len(),
            country_count: countries.len(),
            distance_km,
            distance_miles: distance_km * MILES_PER_KM,
        }
    }
}

/// Totals shown when a trace completes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub hop_count: usize,
    pub country_count: usize,
    pub distance_km: f64,
    pub distance_miles: f64,
}

/// Great-circle distance between two hops
fn haversine_km(from: &HopLocation, to: &HopLocation) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lon - from.lon).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}
