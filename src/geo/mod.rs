// Geo module - hop locations and the outcome of a single lookup

pub mod resolver;

use serde::Serialize;
use std::net::Ipv4Addr;

use crate::error::LookupFailure;

/// City reported when the lookup service does not know one
pub const UNKNOWN_CITY: &str = "Unknown";

/// Approximate location of one hop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HopLocation {
    pub ip: Ipv4Addr,
    pub lat: f64,
    pub lon: f64,
    /// ISO 3166-1 alpha-2 country code
    pub country: String,
    pub city: String,
}

/// Result of geolocating one address; a lookup never errors
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Resolved(HopLocation),
    Unresolved(LookupFailure),
}

impl Lookup {
    pub fn into_location(self) -> Option<HopLocation> {
        match self {
            Lookup::Resolved(location) => Some(location),
            Lookup::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Lookup::Resolved(_))
    }
}
