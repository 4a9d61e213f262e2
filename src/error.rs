//! Unified error types for the brewing orchestrator.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! caller-facing error handling uniform.  Sensor and actuator failures keep
//! their own small `Copy` enums so they can be passed through the monitor and
//! the relay drivers without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible orchestrator operation funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A recipe, log, process or confirmation request does not exist.
    NotFound(String),
    /// Stored content could not be decoded.
    ParseFailure(String),
    /// Writing an entity to disk failed.
    SavingFailure(String),
    /// A recipe (or log append) violated a structural rule.
    ValidationFailure(String),
    /// A temperature sensor could not be read.
    Sensor(SensorError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// A brewing process is already active on this system.
    AlreadyRunning,
    /// A confirmation referred to a step the process is not waiting on.
    InvalidStep(String),
    /// The watchdog shut the system down; no new process may start.
    FailSafeLatched,
    /// Peripheral or worker initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::ParseFailure(msg) => write!(f, "parse failure: {msg}"),
            Self::SavingFailure(msg) => write!(f, "saving failure: {msg}"),
            Self::ValidationFailure(msg) => write!(f, "validation failure: {msg}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::AlreadyRunning => write!(f, "a brewing process is already running"),
            Self::InvalidStep(msg) => write!(f, "invalid step: {msg}"),
            Self::FailSafeLatched => write!(f, "fail-safe shutdown is latched"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The device is missing or did not answer.
    Unavailable,
    /// The device answered but the reading failed its CRC or could not be parsed.
    Malformed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "sensor unavailable"),
            Self::Malformed => write!(f, "malformed reading"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
