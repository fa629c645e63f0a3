// API module - REST endpoints and wire types

pub mod rest;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TraceRouteRequest {
    pub target: String,
}

/// Body of a successful `POST /trace_route`: `{"hops": [...]}`
pub type TraceRouteResponse = crate::routes::Route;
