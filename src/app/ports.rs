//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BrewingService (domain)
//! ```
//!
//! Driven adapters (relays, thermometers, notification channels, stores,
//! health probes) implement these traits.  The domain core only ever sees
//! the traits, so every adapter can be swapped for a recording mock in tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::SystemConfig;
use crate::error::{ActuatorError, Error, Result, SensorError};
use crate::model::{BrewingLog, LogSummary, Recipe, RecipeSummary};

use super::events::{Notification, RequestId};

// ───────────────────────────────────────────────────────────────
// Actuator port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// On/off control of a heater, stirrer or signal.
pub trait ActuatorControl {
    fn switch_on(&mut self) -> core::result::Result<(), ActuatorError>;

    fn switch_off(&mut self) -> core::result::Result<(), ActuatorError>;

    /// Logical state; polarity is already accounted for.
    fn is_switched_on(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Single-shot temperature sample in degrees Celsius.
pub trait TemperatureReader {
    fn read_temperature(&mut self) -> core::result::Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Notification port (domain → remote device)
// ───────────────────────────────────────────────────────────────

/// Outbound channel to the operator's device.
pub trait NotificationPort {
    fn send(&mut self, notification: &Notification) -> core::result::Result<(), DeliveryError>;

    /// Hide a previously delivered confirmation prompt.
    fn cancel(&mut self, request: RequestId);
}

/// One notification channel shared by the gateway and the brewing service.
pub type SharedNotifier = Arc<Mutex<dyn NotificationPort + Send>>;

// ───────────────────────────────────────────────────────────────
// Health probe port (watchdog → brewing server)
// ───────────────────────────────────────────────────────────────

/// One bounded liveness check against `address`.
pub trait HealthProbe {
    fn probe(&mut self, address: &str) -> core::result::Result<(), ProbeError>;
}

// ───────────────────────────────────────────────────────────────
// Persistence ports
// ───────────────────────────────────────────────────────────────

/// Recipe storage.  Saving never overwrites: the returned id is authoritative.
pub trait RecipeStore {
    fn save_recipe(&self, recipe: &Recipe) -> Result<String>;

    fn get_recipe(&self, id: &str) -> Result<Recipe>;

    /// Built from file headers only; broken files are skipped.
    fn recipe_summaries(&self) -> Result<Vec<RecipeSummary>>;

    fn delete_recipe(&self, id: &str) -> Result<()>;
}

/// Brewing log storage.
pub trait LogStore {
    /// Persist a log; returns the path of the new file.
    fn save_log(&self, log: &BrewingLog) -> Result<PathBuf>;

    fn get_log_by_id(&self, id: i64) -> Result<BrewingLog>;

    /// Every readable log; broken files are skipped.
    fn get_logs(&self) -> Result<Vec<BrewingLog>>;

    fn log_summaries(&self) -> Result<Vec<LogSummary>>;

    /// One past the highest stored log id.
    fn next_log_id(&self) -> Result<i64>;

    fn delete_log(&self, id: i64) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration.  Returns [`SystemConfig::default()`] if none is stored.
    fn load(&self) -> core::result::Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> core::result::Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted(String),
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError(String),
}

/// Errors from [`NotificationPort::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The channel could not be reached; worth retrying.
    Unreachable(String),
    /// The channel answered but refused the message.
    Rejected(String),
}

/// Errors from [`HealthProbe::probe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The server answered outside 200–399.
    Status(u16),
    /// Connection, DNS or timeout failure.
    Transport(String),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted(msg) => write!(f, "config corrupted: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl core::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unreachable(msg) => write!(f, "unreachable: {}", msg),
            Self::Rejected(msg) => write!(f, "rejected: {}", msg),
        }
    }
}

impl core::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Status(code) => write!(f, "unhealthy status {}", code),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Corrupted(msg) => Self::ParseFailure(msg),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::IoError(msg) => {
                log::warn!("Config: {}", msg);
                Self::Config("configuration file could not be accessed")
            }
        }
    }
}
impl std::error::Error for DeliveryError {}
impl std::error::Error for ProbeError {}
