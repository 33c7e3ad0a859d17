//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::util::rate_limit::INPUT_RATE_LIMIT;
use crate::util::time::{DEFAULT_BROADCAST_HZ, MAX_BROADCAST_HZ};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Position broadcasts per second
    pub broadcast_hz: u32,
    /// Capacity of each connection's outbound frame queue
    pub outbound_queue: usize,
    /// Inbound frames allowed per second per connection
    pub input_rate_limit: u32,
    /// How long in-flight connections get to finish after a shutdown signal
    pub shutdown_grace: Duration,

    /// Arena tuning
    pub game: GameConfig,
}

/// Tuning for participants and spawns
#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    /// Health at registration and after every respawn
    pub max_health: f32,
    /// Spawns land in `[-half_extent, half_extent)` on x and z
    pub spawn_half_extent: f32,
    /// y coordinate of every spawn
    pub spawn_height: f32,
    /// Seed for ids and spawn points; OS entropy when unset
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            spawn_half_extent: 9.0,
            spawn_height: 1.0,
            seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR so PaaS hosts can inject it
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let defaults = GameConfig::default();
        let game = GameConfig {
            max_health: positive("MAX_HEALTH", var_or("MAX_HEALTH", defaults.max_health)?)?,
            spawn_half_extent: positive(
                "SPAWN_HALF_EXTENT",
                var_or("SPAWN_HALF_EXTENT", defaults.spawn_half_extent)?,
            )?,
            spawn_height: var_or("SPAWN_HEIGHT", defaults.spawn_height)?,
            seed: match env::var("SPAWN_SEED") {
                Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid("SPAWN_SEED"))?),
                Err(_) => None,
            },
        };

        let broadcast_hz = broadcast_rate(var_or("BROADCAST_HZ", DEFAULT_BROADCAST_HZ)?)?;

        let outbound_queue: usize = var_or("OUTBOUND_QUEUE", 256)?;
        if outbound_queue == 0 {
            return Err(ConfigError::Invalid("OUTBOUND_QUEUE"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            broadcast_hz,
            outbound_queue,
            input_rate_limit: var_or("INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?,
            shutdown_grace: Duration::from_secs(var_or("SHUTDOWN_GRACE_SECS", 3)?),

            game,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            broadcast_hz: DEFAULT_BROADCAST_HZ,
            outbound_queue: 256,
            input_rate_limit: INPUT_RATE_LIMIT,
            shutdown_grace: Duration::from_secs(3),
            game: GameConfig::default(),
        }
    }
}

/// Read `name`, falling back to `default` when unset
fn var_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

fn positive(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(name))
    }
}

fn broadcast_rate(hz: u32) -> Result<u32, ConfigError> {
    if (1..=MAX_BROADCAST_HZ).contains(&hz) {
        Ok(hz)
    } else {
        Err(ConfigError::Invalid("BROADCAST_HZ"))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
