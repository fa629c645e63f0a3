// Route assembler - trace, extract, then geolocate every hop concurrently

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Instant;

use super::Route;
use crate::geo::{resolver::LocationResolver, Lookup};
use crate::trace::{extract::extract_addresses, runner::TraceRunner, TraceTarget};

pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct RouteAssembler {
    runner: TraceRunner,
    resolver: LocationResolver,
    concurrency: usize,
}

impl RouteAssembler {
    pub fn new(runner: TraceRunner, resolver: LocationResolver) -> Self {
        RouteAssembler {
            runner,
            resolver,
            concurrency: DEFAULT_LOOKUP_CONCURRENCY,
        }
    }

    /// Cap on lookups in flight for one trace
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn runner(&self) -> &TraceRunner {
        &self.runner
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// Build the geolocated route to `target`.
    ///
    /// Never fails: an unreachable target, a missing trace tool or a dead
    /// lookup service all produce a route with fewer (or zero) hops.
    pub async fn assemble(&self, target: &TraceTarget) -> Route {
        let started = Instant::now();

        let output = self.runner.run(target).await;
        let addresses = extract_addresses(&output, usize::from(self.runner.settings().max_hops));
        tracing::info!("Trace to {} found {} hop address(es)", target, addresses.len());

        let route = self.locate(&addresses).await;
        let summary = route.summary();
        tracing::info!(
            "Trace to {} completed in {:?}: {} of {} hops located, {} countries, {:.2} km / {:.2} miles",
            target,
            started.elapsed(),
            summary.hop_count,
            addresses.len(),
            summary.country_count,
            summary.distance_km,
            summary.distance_miles
        );

        route
    }

    /// Geolocate `addresses` concurrently, keeping their order and dropping
    /// the ones that could not be resolved.
    pub async fn locate(&self, addresses: &[Ipv4Addr]) -> Route {
        let resolver = &self.resolver;

        let mut lookups: HashMap<Ipv4Addr, Lookup> = stream::iter(addresses.iter().copied())
            .map(|ip| async move { (ip, resolver.resolve(ip).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let unresolved = lookups.values().filter(|lookup| !lookup.is_resolved()).count();
        if unresolved > 0 {
            tracing::debug!("{} of {} hop(s) could not be located", unresolved, addresses.len());
        }

        let hops = addresses
            .iter()
            .filter_map(|ip| lookups.remove(ip))
            .filter_map(Lookup::into_location)
            .collect();

        Route::new(hops)
    }
}
