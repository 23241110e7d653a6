//! Runtime configuration read from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::coordinator::CoordinatorConfig;
use crate::osrm::OsrmConfig;
use crate::service::DEFAULT_FETCH_TIMEOUT;
use crate::tracker::TrackerConfig;

pub const ADDR_VAR: &str = "FLEET_ROUTER_ADDR";
pub const FETCH_TIMEOUT_VAR: &str = "FLEET_ROUTER_FETCH_TIMEOUT_SECS";
pub const MIN_UPDATE_VAR: &str = "FLEET_ROUTER_MIN_UPDATE_SECS";
pub const REFRESH_VAR: &str = "FLEET_ROUTER_REFRESH_SECS";
pub const SEED_VAR: &str = "FLEET_ROUTER_SEED";
pub const OSRM_URL_VAR: &str = "OSRM_URL";
pub const OSRM_PROFILE_VAR: &str = "OSRM_PROFILE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is not a valid {expected}: {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Where travel costs come from.
#[derive(Debug, Clone)]
pub enum CostProviderConfig {
    Haversine,
    Osrm(OsrmConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub fetch_timeout: Duration,
    pub tracker: TrackerConfig,
    pub coordinator: CoordinatorConfig,
    pub cost_provider: CostProviderConfig,
    pub seed_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            tracker: TrackerConfig::default(),
            coordinator: CoordinatorConfig::default(),
            cost_provider: CostProviderConfig::Haversine,
            seed_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable lookup; unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(value) = lookup(ADDR_VAR) {
            config.listen_addr = value.parse().map_err(|_| ConfigError::Invalid {
                name: ADDR_VAR,
                expected: "socket address",
                value,
            })?;
        }
        if let Some(secs) = seconds(&lookup, FETCH_TIMEOUT_VAR)? {
            config.fetch_timeout = secs;
        }
        if let Some(secs) = seconds(&lookup, MIN_UPDATE_VAR)? {
            config.tracker.min_update_interval = secs;
        }
        if let Some(secs) = seconds(&lookup, REFRESH_VAR)? {
            config.coordinator.refresh_interval = secs;
        }
        config.seed_path = lookup(SEED_VAR).map(PathBuf::from);

        if let Some(base_url) = lookup(OSRM_URL_VAR) {
            let defaults = OsrmConfig::default();
            config.cost_provider = CostProviderConfig::Osrm(OsrmConfig {
                base_url,
                profile: lookup(OSRM_PROFILE_VAR).unwrap_or(defaults.profile),
                timeout_secs: config.fetch_timeout.as_secs().max(1),
            });
        }

        Ok(config)
    }
}

fn seconds<F>(lookup: &F, name: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::Invalid {
            name,
            expected: "positive number of seconds",
            value,
        }),
    }
}
