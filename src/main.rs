mod api;
mod config;
mod error;
mod geo;
mod routes;
mod trace;

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use api::rest::AppState;
use config::Config;
use error::AppResult;
use geo::resolver::LocationResolver;
use routes::assembler::RouteAssembler;
use trace::{runner::TraceRunner, TraceTarget};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    // Initialize logging; RUST_LOG directives win over the configured level.
    // Logs go to stderr so `--once` leaves stdout as pure JSON.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(config.log_level).into())
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &config.source {
        tracing::info!("Loaded configuration from: {}", path.display());
    }

    let assembler = build_assembler(&config)?;

    if let Some(target) = &config.once {
        let json = match trace_once(&assembler, target).await {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("{}", e);
                anyhow::bail!(e.user_message());
            }
        };
        println!("{}", json);
        return Ok(());
    }

    tracing::info!("Geo traceroute starting...");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    tracing::info!("Tracing from host: {}", hostname);
    tracing::info!(
        "Trace strategy: {} ({}), max {} hops",
        assembler.runner().strategy(),
        assembler.runner().program(),
        config.trace.max_hops
    );
    tracing::info!("Geolocation service: {}", assembler.resolver().base_url());

    let state = Arc::new(AppState::new(assembler));
    let app = api::rest::create_api_router(state, &config.static_dir, config.cors);

    let listener = tokio::net::TcpListener::bind((config.bind_address.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.bind_address, config.port))?;
    let addr = listener.local_addr()?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST http://{}/trace_route", addr);
    tracing::info!("Web UI: http://{}/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn build_assembler(config: &Config) -> anyhow::Result<RouteAssembler> {
    let mut runner = TraceRunner::new(config.strategy, config.trace.clone());
    if let Some(program) = &config.trace_program {
        runner = runner.with_program(program.clone());
    }

    let resolver = LocationResolver::new(config.geo_base_url.clone(), config.geo_timeout)
        .context("building geolocation HTTP client")?;

    Ok(RouteAssembler::new(runner, resolver).with_concurrency(config.lookup_concurrency))
}

/// Trace one target and render the route as pretty JSON
async fn trace_once(assembler: &RouteAssembler, raw_target: &str) -> AppResult<String> {
    let target = TraceTarget::parse(raw_target)?;
    let route = assembler.assemble(&target).await;
    Ok(serde_json::to_string_pretty(&route)?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
