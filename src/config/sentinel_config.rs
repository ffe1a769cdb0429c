//! Sentinel configuration - every liveness and reconnect tunable as TOML
//!
//! Each struct implements `Default` with the values from [`super::defaults`],
//! so a missing file or a missing section behaves exactly like the built-in
//! policy.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SENTINEL_CONFIG";

/// File looked up in the working directory when the env var is unset.
pub const LOCAL_CONFIG_FILE: &str = "sentinel.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `SentinelConfig::load()` which searches:
/// 1. `$SENTINEL_CONFIG`
/// 2. `./sentinel.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub thresholds: ThresholdConfig,

    #[serde(default)]
    pub recovery: RecoveryConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl SentinelConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), vendor = %config.device.vendor, "Loaded config from SENTINEL_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from SENTINEL_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "SENTINEL_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(vendor = %config.device.vendor, "Loaded config from ./sentinel.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./sentinel.toml, using defaults");
                }
            }
        }

        info!("No sentinel.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate configuration text.
    ///
    /// Unknown keys are reported as warnings, never as errors.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Range and ordering checks. All problems are collected before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        let mut errors: Vec<String> = Vec::new();

        if t.dead_on_start_mins <= 0 {
            errors.push(format!(
                "thresholds.dead_on_start_mins ({}) must be positive",
                t.dead_on_start_mins
            ));
        }
        if t.degraded_timeout_mins <= 0 {
            errors.push(format!(
                "thresholds.degraded_timeout_mins ({}) must be positive",
                t.degraded_timeout_mins
            ));
        }
        if t.critical_timeout_mins <= t.degraded_timeout_mins {
            errors.push(format!(
                "thresholds.critical_timeout_mins ({}) must be greater than degraded_timeout_mins ({})",
                t.critical_timeout_mins, t.degraded_timeout_mins
            ));
        }
        if t.alert_cooldown_secs < 0 {
            errors.push(format!(
                "thresholds.alert_cooldown_secs ({}) must not be negative",
                t.alert_cooldown_secs
            ));
        }
        if self.connection.reconnect_ladder_secs.is_empty() {
            errors.push("connection.reconnect_ladder_secs must not be empty".to_string());
        }
        if self.worker.heartbeat_interval_secs == 0 {
            errors.push("worker.heartbeat_interval_secs must be positive".to_string());
        }
        if self.worker.heartbeat_interval_secs > u64::try_from(t.degraded_timeout_mins.saturating_mul(60)).unwrap_or(0) {
            errors.push(format!(
                "worker.heartbeat_interval_secs ({}) exceeds the degraded timeout; a healthy worker would look degraded",
                self.worker.heartbeat_interval_secs
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Device identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Manufacturer string as reported by the device, e.g. "Xiaomi".
    pub vendor: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor: "generic".to_string(),
        }
    }
}

/// Heartbeat-age thresholds and alert spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub dead_on_start_mins: i64,
    pub degraded_timeout_mins: i64,
    pub critical_timeout_mins: i64,
    pub alert_cooldown_secs: i64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            dead_on_start_mins: defaults::DEAD_ON_START_THRESHOLD_MINS,
            degraded_timeout_mins: defaults::DEGRADED_TIMEOUT_MINS,
            critical_timeout_mins: defaults::CRITICAL_TIMEOUT_MINS,
            alert_cooldown_secs: defaults::ALERT_COOLDOWN_SECS,
        }
    }
}

impl ThresholdConfig {
    pub fn dead_on_start(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.dead_on_start_mins).unwrap_or(TimeDelta::MAX)
    }

    pub fn degraded_timeout(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.degraded_timeout_mins).unwrap_or(TimeDelta::MAX)
    }

    pub fn critical_timeout(&self) -> TimeDelta {
        TimeDelta::try_minutes(self.critical_timeout_mins).unwrap_or(TimeDelta::MAX)
    }

    pub fn alert_cooldown(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.alert_cooldown_secs).unwrap_or(TimeDelta::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub step_delay_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: defaults::RECOVERY_STEP_DELAY_MS,
        }
    }
}

impl RecoveryConfig {
    pub const fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Identity the transport presents to the broker.
    pub client_id: String,
    pub reconnect_ladder_secs: Vec<u64>,
    /// Topics subscribed as soon as the supervisor starts.
    pub topics: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            client_id: defaults::DEFAULT_CLIENT_ID.to_string(),
            reconnect_ladder_secs: defaults::RECONNECT_LADDER_SECS.to_vec(),
            topics: Vec::new(),
        }
    }
}

impl ConnectionConfig {
    pub fn reconnect_ladder(&self) -> Vec<Duration> {
        self.reconnect_ladder_secs
            .iter()
            .map(|s| Duration::from_secs(*s))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub heartbeat_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: defaults::HEARTBEAT_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::DEFAULT_STORE_PATH),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),
    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}
