//! Sensor subsystem: thermometer drivers and the polling [`monitor::TemperatureMonitor`].
//!
//! The monitor owns one thermometer and fans samples out to threshold
//! listeners and sample observers registered by the brewing process.

pub mod monitor;
pub mod recorder;
pub mod thermometer;

pub use monitor::{ListenerAction, ListenerHandle, MonitorHandle, TemperatureMonitor};
pub use recorder::TemperatureRecorder;
