//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::slot::MIN_CHANNEL_CAPACITY;

/// Who decides that a shot ended the game
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefereeMode {
    /// The server recomputes each trajectory
    Server,
    /// Outcomes are reported through `POST /api/v1/game-over`
    External,
}

impl FromStr for RefereeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "external" => Ok(Self::External),
            _ => Err(ConfigError::Invalid("REFEREE", s.to_string())),
        }
    }
}

/// Log line format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::Invalid("LOG_FORMAT", s.to_string())),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,

    /// Allowed client origins for CORS, comma-separated; `*` allows any
    pub client_origin: String,

    pub referee: RefereeMode,
    /// Requests per second accepted on the mutating API routes
    pub api_rate_limit: u32,
    /// Outbound events buffered per WebSocket connection
    pub channel_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR, as on most hosting platforms
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port.trim()),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: lookup("LOG_FORMAT")
                .map(|v| v.parse::<LogFormat>())
                .transpose()?
                .unwrap_or(LogFormat::Pretty),

            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            referee: lookup("REFEREE")
                .map(|v| v.parse::<RefereeMode>())
                .transpose()?
                .unwrap_or(RefereeMode::Server),
            api_rate_limit: parse_at_least(&lookup, "API_RATE_LIMIT", 1, 20)?,
            channel_capacity: parse_at_least(
                &lookup,
                "CHANNEL_CAPACITY",
                MIN_CHANNEL_CAPACITY,
                64,
            )?,
        })
    }

    /// `None` when any origin is allowed
    pub fn allowed_origins(&self) -> Option<Vec<&str>> {
        let origins: Vec<&str> = self
            .client_origin
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if origins.is_empty() || origins.contains(&"*") {
            None
        } else {
            Some(origins)
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            client_origin: "*".to_string(),
            referee: RefereeMode::Server,
            api_rate_limit: 20,
            channel_capacity: 64,
        }
    }
}

fn parse_at_least<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    min: T,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) if value >= min => Ok(value),
            _ => Err(ConfigError::Invalid(key, raw)),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server_addr.port(), 3000);
        assert_eq!(config.referee, RefereeMode::Server);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.api_rate_limit, 20);
        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.allowed_origins(), None);
    }

    #[test]
    fn port_wins_over_server_addr() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "4100"),
            ("SERVER_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(config.server_addr.port(), 4100);

        let config = Config::from_lookup(lookup(&[("SERVER_ADDR", "127.0.0.1:9000")])).unwrap();
        assert_eq!(config.server_addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn referee_and_format_parse_case_insensitively() {
        let config = Config::from_lookup(lookup(&[
            ("REFEREE", "External"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.referee, RefereeMode::External);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "http")])),
            Err(ConfigError::InvalidAddress)
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("REFEREE", "client")])),
            Err(ConfigError::Invalid("REFEREE", _))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("API_RATE_LIMIT", "0")])),
            Err(ConfigError::Invalid("API_RATE_LIMIT", _))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("CHANNEL_CAPACITY", "lots")])),
            Err(ConfigError::Invalid("CHANNEL_CAPACITY", _))
        ));
    }

    #[test]
    fn channel_capacity_must_fit_a_start_burst() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("CHANNEL_CAPACITY", "1")])),
            Err(ConfigError::Invalid("CHANNEL_CAPACITY", _))
        ));
        let config = Config::from_lookup(lookup(&[("CHANNEL_CAPACITY", "2")])).unwrap();
        assert_eq!(config.channel_capacity, MIN_CHANNEL_CAPACITY);
    }

    #[test]
    fn explicit_origins_are_split() {
        let config = Config::from_lookup(lookup(&[(
            "CLIENT_ORIGIN",
            "http://localhost:5173, https://duel.example",
        )]))
        .unwrap();
        assert_eq!(
            config.allowed_origins(),
            Some(vec!["http://localhost:5173", "https://duel.example"])
        );
    }
}
