//! Closed-loop heater control.

pub mod thermostat;

pub use thermostat::Thermostat;
