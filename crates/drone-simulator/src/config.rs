//! # Simulator Configuration
//!
//! Environment-based configuration for the simulator. Command-line flags
//! override individual values after loading.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use drone_domain::{DEFAULT_AIRPORTS_JSON, FleetConfig, parse_fleet_configs};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::coordinator::{CoordinatorSettings, TickMode};
use crate::error::ConfigurationError;
use crate::fleet::Fleet;

pub const DEFAULT_TICK_MS: u64 = 1000;
pub const DEFAULT_DRONE_SPEED: f64 = 0.003;
pub const DEFAULT_API_URL: &str = "http://localhost:8080/telemetry";

/// Where tick batches go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SinkKind {
    /// Log only (dry run).
    #[default]
    Log,
    /// POST to `api_url`.
    Http,
}

impl SinkKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Http => "http",
        }
    }
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" | "dry-run" => Ok(Self::Log),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown sink '{other}'")),
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Airports to simulate, one fleet each
    pub airports: Vec<FleetConfig>,

    /// Time between ticks
    pub tick_interval: Duration,

    /// Distance covered per tick, in degrees
    pub drone_speed: f64,

    /// Base seed for route generation; fleet `i` uses `seed + i`
    pub seed: Option<u64>,

    /// Lockstep or free-running ticks
    pub mode: TickMode,

    /// Stop after this many ticks
    pub max_ticks: Option<u64>,

    /// Telemetry destination
    pub sink: SinkKind,

    /// Ingest endpoint for the HTTP sink
    pub api_url: String,

    /// Per-request HTTP sink timeout; the tick interval when unset
    pub sink_timeout: Option<Duration>,

    /// Logging level
    pub log_level: String,
}

impl SimulatorConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Fails on unparseable values or malformed `SIM_AIRPORTS` JSON.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Blank values
    /// count as unset.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let airports = match lookup("SIM_AIRPORTS") {
            Some(json) => parse_fleet_configs(&json)?,
            None => parse_fleet_configs(DEFAULT_AIRPORTS_JSON)?,
        };

        let tick_ms = setting(&lookup, "SIM_TICK_MS")?.unwrap_or(DEFAULT_TICK_MS);
        if tick_ms == 0 {
            return Err(ConfigurationError::ZeroTickInterval);
        }

        let sink_timeout = match setting::<u64, _>(&lookup, "SIM_SINK_TIMEOUT_MS")? {
            Some(0) => {
                return Err(ConfigurationError::InvalidSetting {
                    key: "SIM_SINK_TIMEOUT_MS",
                    value: "0".to_string(),
                });
            }
            other => other.map(Duration::from_millis),
        };

        Ok(Self {
            airports,
            tick_interval: Duration::from_millis(tick_ms),
            drone_speed: setting(&lookup, "SIM_DRONE_SPEED")?.unwrap_or(DEFAULT_DRONE_SPEED),
            seed: setting(&lookup, "SIM_SEED")?,
            mode: setting(&lookup, "SIM_MODE")?.unwrap_or_default(),
            max_ticks: setting(&lookup, "SIM_MAX_TICKS")?,
            sink: setting(&lookup, "SIM_SINK")?.unwrap_or_default(),
            api_url: lookup("SIM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            sink_timeout,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Build one fleet per airport.
    ///
    /// With a seed every run flies the same routes; without one each fleet
    /// draws from fresh entropy.
    ///
    /// # Errors
    ///
    /// Returns the first airport that fails fleet validation.
    pub fn build_fleets(&self) -> Result<Vec<Fleet>, ConfigurationError> {
        self.airports
            .iter()
            .enumerate()
            .map(|(index, airport)| {
                let rng = match self.seed {
                    Some(seed) => StdRng::seed_from_u64(
                        seed.wrapping_add(u64::try_from(index).unwrap_or(u64::MAX)),
                    ),
                    None => StdRng::from_entropy(),
                };
                Fleet::new(airport, self.drone_speed, rng)
            })
            .collect()
    }

    /// Upper bound on one HTTP delivery, so a hung endpoint costs at most
    /// about one tick.
    pub fn sink_timeout(&self) -> Duration {
        self.sink_timeout.unwrap_or(self.tick_interval)
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            mode: self.mode,
            tick_interval: self.tick_interval,
            max_ticks: self.max_ticks,
        }
    }
}

fn setting<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigurationError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };

    match value.trim().parse() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => Err(ConfigurationError::InvalidSetting { key, value }),
    }
}
