//! Plain `key=value` configuration.
//!
//! The host reads `trading_config.txt` (one `key=value` per line, `#`
//! comments, whitespace-tolerant) into a typed [`Config`] and hands it to
//! the core explicitly; nothing in the library reads process-wide state.
//! Unknown keys are logged and ignored so configs can carry keys for other
//! deployments.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::risk::RiskLimits;
use crate::types::Quantity;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "trading_config.txt";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("config line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub dashboard: DashboardConfig,
    pub risk: RiskConfig,
    pub logging: LoggingConfig,
    pub matching: MatchingConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub max_clients: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DashboardConfig {
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RiskConfig {
    pub max_order_size: Quantity,
    pub max_position_size: i64,
    pub max_daily_loss: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchingConfig {
    pub enable_profiling: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8080,
                max_clients: 32,
            },
            dashboard: DashboardConfig { port: 8081 },
            risk: RiskConfig {
                max_order_size: 10_000,
                max_position_size: 50_000,
                max_daily_loss: 100_000.0,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: None,
            },
            matching: MatchingConfig {
                enable_profiling: false,
            },
        }
    }
}

impl RiskConfig {
    /// Expand the configured subset into full limits; everything the file
    /// does not cover keeps its default.
    pub fn to_limits(&self) -> RiskLimits {
        RiskLimits {
            max_order_size: self.max_order_size,
            max_position_size: self.max_position_size,
            max_daily_loss: self.max_daily_loss,
            ..RiskLimits::default()
        }
    }
}

impl Config {
    /// Load and parse a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Parse config text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Parse {
                line: line_no,
                message: format!("expected key=value, got {line:?}"),
            })?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "server.port" => config.server.port = parse_value(line_no, key, value)?,
                "server.max_clients" => config.server.max_clients = parse_value(line_no, key, value)?,
                "dashboard.port" => config.dashboard.port = parse_value(line_no, key, value)?,
                "risk.max_order_size" => config.risk.max_order_size = parse_value(line_no, key, value)?,
                "risk.max_position_size" => {
                    config.risk.max_position_size = parse_value(line_no, key, value)?
                }
                "risk.max_daily_loss" => config.risk.max_daily_loss = parse_value(line_no, key, value)?,
                "logging.level" => config.logging.level = value.to_string(),
                "logging.file" => config.logging.file = Some(value.to_string()),
                "matching.enable_profiling" => {
                    config.matching.enable_profiling = parse_flag(value)
                }
                _ => warn!(key, "unknown config key ignored"),
            }
        }

        Ok(config)
    }
}

fn parse_value<T>(line: usize, key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|err| ConfigError::Parse {
        line,
        message: format!("{key}: {err}"),
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
