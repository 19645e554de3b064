//! Configuration module for logingate.

use serde::Deserialize;
use std::path::Path;

use crate::db::TimestampMode;
use crate::{GateError, Result};

/// Environment variable overriding `database.url`.
pub const DATABASE_URL_ENV: &str = "LOGINGATE_DATABASE_URL";

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL (e.g. `sqlite://data/logingate.db?mode=rwc`).
    #[serde(default = "default_db_url")]
    pub url: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How the `last_login` column is decoded.
    ///
    /// When unset, the backend default is used.
    #[serde(default)]
    pub timestamp_mode: Option<TimestampMode>,
}

fn default_db_url() -> String {
    "sqlite://data/logingate.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseConfig {
    /// The timestamp mode in effect for this deployment.
    pub fn effective_timestamp_mode(&self) -> TimestampMode {
        self.timestamp_mode.unwrap_or_else(TimestampMode::backend_default)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_max_connections(),
            timestamp_mode: None,
        }
    }
}

/// Password hashing configuration (Argon2id costs).
#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_cost")]
    pub memory_cost_kib: u32,
    /// Number of iterations.
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,
    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_cost() -> u32 {
    65536 // 64 MB
}

fn default_time_cost() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    4
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_cost_kib: default_memory_cost(),
            time_cost: default_time_cost(),
            parallelism: default_parallelism(),
        }
    }
}

/// Login session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Failed attempts allowed before a lockout.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Lockout duration in seconds.
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_lockout_secs() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            lockout_secs: default_lockout_secs(),
        }
    }
}

/// Display configuration for admin output.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Timezone for displaying dates (e.g., "Europe/Berlin", "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// strftime pattern used for last-login output.
    #[serde(default = "default_last_login_format")]
    pub last_login_format: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_last_login_format() -> String {
    "%Y-%m-%d %H:%M:%S %Z".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            last_login_format: default_last_login_format(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/logingate.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Password hashing configuration.
    #[serde(default)]
    pub hashing: HashingConfig,
    /// Login session configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Display configuration.
    #[serde(default)]
    pub display: DisplayConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GateError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GateError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `LOGINGATE_DATABASE_URL`: Override the database URL
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.is_empty() {
                self.database.url = url;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(GateError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.hashing.time_cost == 0 || self.hashing.parallelism == 0 {
            return Err(GateError::Config(
                "hashing.time_cost and hashing.parallelism must be at least 1".to_string(),
            ));
        }
        if self.hashing.memory_cost_kib < 8 * self.hashing.parallelism {
            return Err(GateError::Config(
                "hashing.memory_cost_kib must be at least 8 * parallelism".to_string(),
            ));
        }
        if self.session.max_attempts == 0 {
            return Err(GateError::Config(
                "session.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.display.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(GateError::Config(format!(
                "unknown timezone: {}",
                self.display.timezone
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.database.url, "sqlite://data/logingate.db?mode=rwc");
        assert_eq!(config.database.max_connections, 5);
        assert!(config.database.timestamp_mode.is_none());

        assert_eq!(config.hashing.memory_cost_kib, 65536);
        assert_eq!(config.hashing.time_cost, 3);
        assert_eq!(config.hashing.parallelism, 4);

        assert_eq!(config.session.max_attempts, 3);
        assert_eq!(config.session.lockout_secs, 300);

        assert_eq!(config.display.timezone, "UTC");

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file, "logs/logingate.log");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[database]
url = "postgres://auth@localhost/game"
max_connections = 10
timestamp_mode = "native"

[hashing]
memory_cost_kib = 19456
time_cost = 2
parallelism = 1

[session]
max_attempts = 5
lockout_secs = 60

[display]
timezone = "Europe/Berlin"
last_login_format = "%d.%m.%Y %H:%M"

[logging]
level = "debug"
file = "custom/logs/auth.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.database.url, "postgres://auth@localhost/game");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.timestamp_mode, Some(TimestampMode::Native));
        assert_eq!(
            config.database.effective_timestamp_mode(),
            TimestampMode::Native
        );

        assert_eq!(config.hashing.memory_cost_kib, 19456);
        assert_eq!(config.hashing.time_cost, 2);
        assert_eq!(config.hashing.parallelism, 1);

        assert_eq!(config.session.max_attempts, 5);
        assert_eq!(config.session.lockout_secs, 60);

        assert_eq!(config.display.timezone, "Europe/Berlin");
        assert_eq!(config.display.last_login_format, "%d.%m.%Y %H:%M");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, "custom/logs/auth.log");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_max_attempts() {
        let config = Config::parse("[session]\nmax_attempts = 0\n").unwrap();
        match config.validate() {
            Err(GateError::Config(msg)) => assert!(msg.contains("max_attempts"), "{msg}"),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_text_timestamp_mode() {
        let config = Config::parse("[database]\ntimestamp_mode = \"text\"\n").unwrap();
        assert_eq!(config.database.effective_timestamp_mode(), TimestampMode::Text);
    }

    #[test]
    fn test_parse_unknown_timestamp_mode() {
        let result = Config::parse("[database]\ntimestamp_mode = \"epoch\"\n");
        assert!(matches!(result, Err(GateError::Config(_))));
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.database.max_connections, 5);
        assert_eq!(
            config.database.effective_timestamp_mode(),
            TimestampMode::backend_default()
        );
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        if let Err(GateError::Config(msg)) = result {
            assert!(msg.contains("config parse error"));
        } else {
            panic!("Expected Config error");
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(GateError::Io(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nmax_attempts = 7\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.session.max_attempts, 7);
    }

    #[test]
    fn test_apply_env_overrides_database_url() {
        let original = std::env::var(DATABASE_URL_ENV).ok();

        std::env::set_var(DATABASE_URL_ENV, "sqlite::memory:");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.database.url, "sqlite::memory:");

        std::env::set_var(DATABASE_URL_ENV, "");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.database.url, default_db_url());

        if let Some(val) = original {
            std::env::set_var(DATABASE_URL_ENV, val);
        } else {
            std::env::remove_var(DATABASE_URL_ENV);
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hashing.time_cost = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hashing.memory_cost_kib = 16;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.display.timezone = "Invalid/Zone".to_string();
        assert!(config.validate().is_err());
    }
}
