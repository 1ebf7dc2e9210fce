//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// World width in pixels
    pub world_width: f64,
    /// World height in pixels
    pub world_height: f64,

    /// Players needed before a room starts simulating
    pub room_min_players: usize,
    /// Hard cap on players per room
    pub room_max_players: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            world_width: parse_or("WORLD_WIDTH", 720.0)?,
            world_height: parse_or("WORLD_HEIGHT", 480.0)?,

            room_min_players: parse_or("ROOM_MIN_PLAYERS", 2)?,
            room_max_players: parse_or("ROOM_MAX_PLAYERS", 4)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
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
