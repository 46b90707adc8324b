//! Configuration module - environment variable parsing

pub mod game;

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Path to the JSON game config with maps and gameplay defaults
    pub game_config: PathBuf,
    /// Tick automatically with this period; manual ticks are refused when set
    pub tick_period: Option<Duration>,
    /// Spawn players at random road points
    pub randomize_spawn_points: bool,

    /// Where game state is saved and restored from
    pub state_file: Option<PathBuf>,
    /// How often state is saved while ticking automatically
    pub save_state_period: Option<Duration>,

    /// Supabase project URL for the leaderboard (in-memory when unset)
    pub supabase_url: Option<String>,
    /// Supabase service role key
    pub supabase_service_role_key: Option<String>,

    /// Allowed client origins for CORS, any when empty
    pub client_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let supabase_url = optional("SUPABASE_URL");
        let supabase_service_role_key = optional("SUPABASE_SERVICE_ROLE_KEY");
        if supabase_url.is_some() && supabase_service_role_key.is_none() {
            return Err(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            game_config: env::var("GAME_CONFIG")
                .map(PathBuf::from)
                .map_err(|_| ConfigError::Missing("GAME_CONFIG"))?,
            tick_period: optional_millis("TICK_PERIOD_MS")?,
            randomize_spawn_points: optional_bool("RANDOMIZE_SPAWN_POINTS")?,

            state_file: optional("STATE_FILE").map(PathBuf::from),
            save_state_period: optional_millis("SAVE_STATE_PERIOD_MS")?,

            supabase_url,
            supabase_service_role_key,

            client_origin: optional("CLIENT_ORIGIN"),
        })
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn optional_millis(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    optional(name)
        .map(|v| match v.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
            _ => Err(ConfigError::Invalid(name, v)),
        })
        .transpose()
}

fn optional_bool(name: &'static str) -> Result<bool, ConfigError> {
    match optional(name).as_deref().map(str::trim) {
        None => Ok(false),
        Some("1" | "true" | "yes") => Ok(true),
        Some("0" | "false" | "no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid(name, other.to_string())),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),

    #[error("Cannot read game config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed game config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Map {map_id}: {source}")]
    Map {
        map_id: String,
        source: crate::game::map::MapError,
    },

    #[error("Duplicate map id {0}")]
    DuplicateMap(String),

    #[error("Game config: {0}")]
    Game(String),
}

#[cfg(test)]
impl Config {
    pub(crate) fn for_tests(tick_period: Option<Duration>) -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: "debug".to_string(),
            game_config: PathBuf::from("game.json"),
            tick_period,
            randomize_spawn_points: false,
            state_file: None,
            save_state_period: None,
            supabase_url: None,
            supabase_service_role_key: None,
            client_origin: None,
        }
    }
}
