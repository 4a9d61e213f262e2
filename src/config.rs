//! System configuration parameters
//!
//! All tunable parameters for the brewing orchestrator.
//! Values can be overridden through a JSON file (see `adapters::config_file`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Timing ---
    /// Process runner tick interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Thermometer poll interval (milliseconds)
    pub temperature_poll_interval_ms: u32,

    // --- Temperatures ---
    /// Half-width of the band around a rest target that counts as "reached" (Celsius)
    pub rest_temperature_delta_c: f32,
    /// Heater switches back on this far below the target (Celsius)
    pub heatup_delta_c: f32,
    /// Target held during hop cooking (Celsius)
    pub boil_temperature_c: f32,
    /// Half-width of the band that counts as boiling; the boil timer starts on entry (Celsius)
    pub boil_temperature_delta_c: f32,

    // --- Additions ---
    /// Advance notice before each hop or malt addition (seconds)
    pub hop_prenotification_secs: u32,

    // --- Temperature log ---
    /// A sample is logged once it differs this much from the last logged one (Celsius)
    pub temperature_log_delta_c: f32,
    /// ... or once this much time has passed since the last logged sample (milliseconds)
    pub temperature_log_interval_ms: u32,

    // --- Watchdog ---
    /// Health endpoint probed by the watchdog
    pub watchdog_address: String,
    /// Pause between probes (milliseconds)
    pub watchdog_interval_ms: u32,
    /// Timeout for a single probe (milliseconds)
    pub watchdog_probe_timeout_ms: u32,
    /// Consecutive failed probes that trigger the fail-safe shutdown
    pub watchdog_failures_until_alert: u32,

    // --- Confirmation delivery ---
    /// Delivery attempts per confirmation request
    pub confirmation_max_attempts: u32,
    /// Pause between delivery attempts (milliseconds)
    pub confirmation_retry_delay_ms: u32,

    // --- Hardware ---
    /// Pending beep patterns before new requests are dropped
    pub beep_queue_capacity: usize,
    /// Kernel GPIO line numbers of the relay pins
    pub heater_pin: u8,
    pub stirrer_pin: u8,
    pub signal_pin: u8,
    /// Heater relay board switches on a low level
    pub heater_active_low: bool,
    /// Sysfs GPIO root used for the relay pins
    pub gpio_sysfs_dir: PathBuf,
    /// Directory holding the 1-Wire `28-*` thermometer devices
    pub thermometer_device_dir: PathBuf,

    // --- Storage ---
    /// Root for `recipes/` and `logs/`
    pub data_dir: PathBuf,
}

impl SystemConfig {
    pub fn recipe_dir(&self) -> PathBuf {
        self.data_dir.join("recipes")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Timing
            control_loop_interval_ms: 500,
            temperature_poll_interval_ms: 1500,

            // Temperatures
            rest_temperature_delta_c: 5.0,
            heatup_delta_c: 2.0,
            boil_temperature_c: 100.0,
            boil_temperature_delta_c: 1.0,

            // Additions
            hop_prenotification_secs: 180,

            // Temperature log
            temperature_log_delta_c: 3.0,
            temperature_log_interval_ms: 5000,

            // Watchdog
            watchdog_address: "http://127.0.0.1:1337/info".to_string(),
            watchdog_interval_ms: 5000,
            watchdog_probe_timeout_ms: 1000,
            watchdog_failures_until_alert: 2,

            // Confirmation delivery
            confirmation_max_attempts: 3,
            confirmation_retry_delay_ms: 1000,

            // Hardware
            beep_queue_capacity: 8,
            heater_pin: 17,
            stirrer_pin: 27,
            signal_pin: 22,
            heater_active_low: true,
            gpio_sysfs_dir: PathBuf::from("/sys/class/gpio"),
            thermometer_device_dir: PathBuf::from("/sys/bus/w1/devices"),

            // Storage
            data_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".brewcore"),
        }
    }
}
