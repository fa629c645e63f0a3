// Configuration management for the geo traceroute service
// Supports CLI arguments, environment variables and a TOML config file

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

use crate::error::{AppError, AppResult};
use crate::geo::resolver::DEFAULT_BASE_URL;
use crate::routes::assembler::DEFAULT_LOOKUP_CONCURRENCY;
use crate::trace::{TraceSettings, TraceStrategy};

const MAX_HOPS_LIMIT: u8 = 64;

/// Geo traceroute - trace the network path to a host and place every hop on a map
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "geo-traceroute")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Web server port
    #[arg(short, long, env = "GEOTRACE_PORT")]
    pub port: Option<u16>,

    /// Address to bind the web server to
    #[arg(long, env = "GEOTRACE_BIND")]
    pub bind: Option<String>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, env = "GEOTRACE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Path to configuration file
    #[arg(short, long, env = "GEOTRACE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the geolocation service, queried as <base>/<ip>
    #[arg(long, env = "GEOTRACE_GEO_URL")]
    pub geo_base_url: Option<String>,

    /// Maximum number of hops to trace
    #[arg(long, env = "GEOTRACE_MAX_HOPS")]
    pub max_hops: Option<u8>,

    /// Trace executable to run instead of traceroute/tracert
    #[arg(long, env = "GEOTRACE_TRACE_PROGRAM")]
    pub trace_program: Option<String>,

    /// Directory holding the visualization page
    #[arg(long, env = "GEOTRACE_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Trace a single target, print the hops as JSON and exit
    #[arg(long, value_name = "TARGET")]
    pub once: Option<String>,
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Path trace settings
    #[serde(default)]
    pub trace: TraceConfig,

    /// Geolocation lookup settings
    #[serde(default)]
    pub geo: GeoConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Web server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default: 127.0.0.1)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Directory holding index.html and its assets
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Send permissive CORS headers
    #[serde(default)]
    pub cors: bool,
}

/// Which trace utility flavour to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyChoice {
    /// Follow the host platform
    #[default]
    Auto,
    Posix,
    Windows,
}

impl StrategyChoice {
    pub fn resolve(self) -> TraceStrategy {
        match self {
            StrategyChoice::Auto => TraceStrategy::for_host(),
            StrategyChoice::Posix => TraceStrategy::Posix,
            StrategyChoice::Windows => TraceStrategy::Windows,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    #[serde(default)]
    pub strategy: StrategyChoice,

    /// Maximum hop count
    #[serde(default = "default_max_hops")]
    pub max_hops: u8,

    /// Per-probe wait in milliseconds (default: 1000 posix, 500 windows)
    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,

    /// Wall-clock limit for one trace in seconds
    #[serde(default = "default_trace_timeout")]
    pub timeout_secs: u64,

    /// Executable override
    #[serde(default)]
    pub program: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    #[serde(default = "default_geo_base_url")]
    pub base_url: String,

    /// Per-lookup timeout in milliseconds
    #[serde(default = "default_geo_timeout")]
    pub timeout_ms: u64,

    /// Lookups in flight per trace
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_port() -> u16 {
    5000
}
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("src/web/static")
}
fn default_max_hops() -> u8 {
    15
}
fn default_trace_timeout() -> u64 {
    60
}
fn default_geo_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_geo_timeout() -> u64 {
    3000
}
fn default_concurrency() -> usize {
    DEFAULT_LOOKUP_CONCURRENCY
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            bind_address: default_bind_address(),
            static_dir: default_static_dir(),
            cors: false,
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            strategy: StrategyChoice::default(),
            max_hops: default_max_hops(),
            probe_timeout_ms: None,
            timeout_secs: default_trace_timeout(),
            program: None,
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        GeoConfig {
            base_url: default_geo_base_url(),
            timeout_ms: default_geo_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub static_dir: PathBuf,
    pub cors: bool,
    pub log_level: Level,
    pub strategy: TraceStrategy,
    pub trace: TraceSettings,
    pub trace_program: Option<String>,
    pub geo_base_url: String,
    pub geo_timeout: Duration,
    pub lookup_concurrency: usize,
    pub once: Option<String>,
    /// Config file that was read, if any
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources (CLI args, environment, config file, defaults)
    /// Priority: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> anyhow::Result<Self> {
        let cli_args = CliArgs::parse();

        let (config_file, source) = match &cli_args.config {
            Some(config_path) => (
                read_config_file(config_path)
                    .with_context(|| format!("reading {}", config_path.display()))?,
                Some(config_path.clone()),
            ),
            None => {
                // Try loading from default locations
                let default_paths = [
                    PathBuf::from("config.toml"),
                    PathBuf::from("geo-traceroute.toml"),
                ];

                match default_paths.into_iter().find(|path| path.exists()) {
                    Some(path) => (
                        read_config_file(&path)
                            .with_context(|| format!("reading {}", path.display()))?,
                        Some(path),
                    ),
                    None => (ConfigFile::default(), None),
                }
            }
        };

        let mut config = Self::merge(cli_args, config_file)?;
        config.source = source;
        Ok(config)
    }

    /// Overlay CLI/environment values on the file configuration and validate
    pub fn merge(cli_args: CliArgs, config_file: ConfigFile) -> AppResult<Self> {
        let ConfigFile {
            server,
            trace,
            geo,
            logging,
        } = config_file;

        let log_level = parse_log_level(cli_args.log_level.as_deref().unwrap_or(&logging.level))?;

        let max_hops = cli_args.max_hops.unwrap_or(trace.max_hops);
        if max_hops == 0 || max_hops > MAX_HOPS_LIMIT {
            return Err(AppError::Config(format!(
                "max_hops must be between 1 and {}, got {}",
                MAX_HOPS_LIMIT, max_hops
            )));
        }
        if trace.timeout_secs == 0 {
            return Err(AppError::Config("trace.timeout_secs must be positive".to_string()));
        }
        if trace.probe_timeout_ms == Some(0) {
            return Err(AppError::Config("trace.probe_timeout_ms must be positive".to_string()));
        }
        if geo.timeout_ms == 0 {
            return Err(AppError::Config("geo.timeout_ms must be positive".to_string()));
        }
        if geo.concurrency == 0 {
            return Err(AppError::Config("geo.concurrency must be at least 1".to_string()));
        }

        let geo_base_url = cli_args.geo_base_url.unwrap_or(geo.base_url);
        if !(geo_base_url.starts_with("http://") || geo_base_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "geolocation base URL must be http(s): {}",
                geo_base_url
            )));
        }

        Ok(Config {
            port: cli_args.port.unwrap_or(server.port),
            bind_address: cli_args.bind.unwrap_or(server.bind_address),
            static_dir: cli_args.static_dir.unwrap_or(server.static_dir),
            cors: server.cors,
            log_level,
            strategy: trace.strategy.resolve(),
            trace: TraceSettings {
                max_hops,
                probe_timeout: trace.probe_timeout_ms.map(Duration::from_millis),
                process_timeout: Duration::from_secs(trace.timeout_secs),
            },
            trace_program: cli_args.trace_program.or(trace.program),
            geo_base_url,
            geo_timeout: Duration::from_millis(geo.timeout_ms),
            lookup_concurrency: geo.concurrency,
            once: cli_args.once,
            source: None,
        })
    }
}

fn read_config_file(path: &Path) -> AppResult<ConfigFile> {
    let config_content = std::fs::read_to_string(path)?;
    toml::from_str::<ConfigFile>(&config_content)
        .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
}

fn parse_log_level(level_str: &str) -> AppResult<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(AppError::Config(format!("Invalid log level: {}", level_str))),
    }
}
