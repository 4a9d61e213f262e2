//! JSON configuration file adapter.
//!
//! Implements [`ConfigPort`] on a single `config.json`.  A missing file
//! yields [`SystemConfig::default()`]; every field is range-checked before
//! it is written, and after it is read.

use std::path::{Path, PathBuf};

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if !(100..=5000).contains(&cfg.control_loop_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_loop_interval_ms must be 100–5000",
        ));
    }
    if !(100..=60_000).contains(&cfg.temperature_poll_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "temperature_poll_interval_ms must be 100–60000",
        ));
    }
    if !(0.1..=20.0).contains(&cfg.rest_temperature_delta_c) {
        return Err(ConfigError::ValidationFailed(
            "rest_temperature_delta_c must be 0.1–20.0",
        ));
    }
    if !(0.1..=20.0).contains(&cfg.heatup_delta_c) {
        return Err(ConfigError::ValidationFailed(
            "heatup_delta_c must be 0.1–20.0",
        ));
    }
    if !(50.0..=105.0).contains(&cfg.boil_temperature_c) {
        return Err(ConfigError::ValidationFailed(
            "boil_temperature_c must be 50.0–105.0",
        ));
    }
    if !(0.1..=10.0).contains(&cfg.boil_temperature_delta_c) {
        return Err(ConfigError::ValidationFailed(
            "boil_temperature_delta_c must be 0.1–10.0",
        ));
    }
    if !(0.1..=50.0).contains(&cfg.temperature_log_delta_c) {
        return Err(ConfigError::ValidationFailed(
            "temperature_log_delta_c must be 0.1–50.0",
        ));
    }
    if !(1000..=3_600_000).contains(&cfg.temperature_log_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "temperature_log_interval_ms must be 1000–3600000",
        ));
    }
    if cfg.hop_prenotification_secs > 3600 {
        return Err(ConfigError::ValidationFailed(
            "hop_prenotification_secs must be 0–3600",
        ));
    }
    if cfg.watchdog_address.trim().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "watchdog_address must not be empty",
        ));
    }
    if !(100..=600_000).contains(&cfg.watchdog_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "watchdog_interval_ms must be 100–600000",
        ));
    }
    if cfg.watchdog_probe_timeout_ms == 0
        || cfg.watchdog_probe_timeout_ms > cfg.watchdog_interval_ms
    {
        return Err(ConfigError::ValidationFailed(
            "watchdog_probe_timeout_ms must be 1..=watchdog_interval_ms",
        ));
    }
    if !(1..=100).contains(&cfg.watchdog_failures_until_alert) {
        return Err(ConfigError::ValidationFailed(
            "watchdog_failures_until_alert must be 1–100",
        ));
    }
    if !(1..=20).contains(&cfg.confirmation_max_attempts) {
        return Err(ConfigError::ValidationFailed(
            "confirmation_max_attempts must be 1–20",
        ));
    }
    if !(1..=crate::drivers::beeper::MAX_PENDING_BEEPS).contains(&cfg.beep_queue_capacity) {
        return Err(ConfigError::ValidationFailed(
            "beep_queue_capacity must be 1–16",
        ));
    }
    Ok(())
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Config: {} not found, using defaults",
                    self.path.display()
                );
                return Ok(SystemConfig::default());
            }
            Err(e) => return Err(ConfigError::IoError(e.to_string())),
        };
        let cfg: SystemConfig =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        validate_config(&cfg)?;
        info!("Config: loaded {}", self.path.display());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::write(&self.path, json).map_err(|e| ConfigError::IoError(e.to_string()))?;
        info!("Config: saved {}", self.path.display());
        Ok(())
    }
}
