//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section is optional. A missing section (or a missing file, see
//! [`Config::load_or_default`]) falls back to the values the field units ship with.

use chrono::NaiveDateTime;
use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{HubError, Result};

/// Format of the clock fallback timestamp
pub const CLOCK_FALLBACK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub downlink: DownlinkConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sensor port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default = "default_description_filter")]
    pub description_filter: String,

    #[serde(default = "default_sensor_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_data_dir")]
    pub log_dir: String,

    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Downlink transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DownlinkConfig {
    #[serde(default = "default_downlink_port")]
    pub port: String,

    #[serde(default = "default_downlink_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_downlink_tag")]
    pub tag: String,

    #[serde(default = "default_downlink_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
}

/// Supervisor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SupervisorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// RTC clock synchronization configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ClockConfig {
    #[serde(default = "default_clock_enabled")]
    pub enabled: bool,

    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,

    #[serde(default = "default_rtc_address")]
    pub address: u16,

    #[serde(default = "default_clock_fallback")]
    pub fallback: String,
}

/// Diagnostics logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_file")]
    pub file: String,

    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_description_filter() -> String { "FT232R".to_string() }
fn default_sensor_baud_rate() -> u32 { 9600 }
fn default_data_dir() -> String { "./data".to_string() }
fn default_idle_interval_ms() -> u64 { 100 }
fn default_error_backoff_ms() -> u64 { 1000 }
fn default_read_timeout_ms() -> u64 { 100 }

fn default_downlink_port() -> String { "/dev/ttyS0".to_string() }
fn default_downlink_baud_rate() -> u32 { 1200 }
fn default_downlink_tag() -> String { "CU".to_string() }
fn default_downlink_interval_ms() -> u64 { 2000 }

fn default_poll_interval_ms() -> u64 { 1000 }

fn default_clock_enabled() -> bool { true }
fn default_i2c_bus() -> u8 { 1 }
fn default_rtc_address() -> u16 { 0x68 }
fn default_clock_fallback() -> String { "2023-01-01 00:00:00".to_string() }

fn default_log_file() -> String { "./application.log".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            description_filter: default_description_filter(),
            baud_rate: default_sensor_baud_rate(),
            log_dir: default_data_dir(),
            idle_interval_ms: default_idle_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for DownlinkConfig {
    fn default() -> Self {
        Self {
            port: default_downlink_port(),
            baud_rate: default_downlink_baud_rate(),
            tag: default_downlink_tag(),
            interval_ms: default_downlink_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { poll_interval_ms: default_poll_interval_ms() }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            enabled: default_clock_enabled(),
            i2c_bus: default_i2c_bus(),
            address: default_rtc_address(),
            fallback: default_clock_fallback(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

impl SensorConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl DownlinkConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl SupervisorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ClockConfig {
    /// Parse the fallback timestamp applied when the RTC cannot be read
    pub fn fallback_datetime(&self) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.fallback, CLOCK_FALLBACK_FORMAT).map_err(|e| {
            HubError::Config(toml::de::Error::custom(format!(
                "clock fallback '{}' must match {}: {}",
                self.fallback, CLOCK_FALLBACK_FORMAT, e
            )))
        })
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use uart_telemetry::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration, using defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.sensors.description_filter.is_empty() {
            return Err(invalid("description_filter cannot be empty"));
        }

        if self.sensors.log_dir.is_empty() {
            return Err(invalid("sensors log_dir cannot be empty"));
        }

        if self.downlink.port.is_empty() {
            return Err(invalid("downlink port cannot be empty"));
        }

        if self.sensors.baud_rate == 0 || self.downlink.baud_rate == 0 {
            return Err(invalid("baud_rate must be greater than 0"));
        }

        let tag = &self.downlink.tag;
        if tag.len() != 2 || !tag.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid("downlink tag must be exactly two ASCII letters"));
        }

        // Validate timing fields
        for (name, value, max) in [
            ("idle_interval_ms", self.sensors.idle_interval_ms, 10_000),
            ("read_timeout_ms", self.sensors.read_timeout_ms, 10_000),
            ("sensors.error_backoff_ms", self.sensors.error_backoff_ms, 60_000),
            ("downlink.interval_ms", self.downlink.interval_ms, 600_000),
            ("downlink.error_backoff_ms", self.downlink.error_backoff_ms, 60_000),
            ("poll_interval_ms", self.supervisor.poll_interval_ms, 60_000),
        ] {
            if value == 0 || value > max {
                return Err(invalid(format!("{} must be between 1 and {}", name, max)));
            }
        }

        // 7-bit I2C addressing only
        if self.clock.address > 0x7F {
            return Err(invalid("clock address must be a 7-bit I2C address"));
        }

        self.clock.fallback_datetime()?;

        if self.logging.file.is_empty() {
            return Err(invalid("logging file cannot be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> HubError {
    HubError::Config(toml::de::Error::custom(msg))
}
