//! Application core: the brewing process and everything it orchestrates.
//!
//! Business rules live here and in [`crate::fsm`].  All interaction with
//! hardware, the operator's device and storage goes through the **port
//! traits** in [`ports`], keeping this layer testable with recording mocks.

pub mod commands;
pub mod controller;
pub mod events;
pub mod gateway;
pub mod ports;
pub mod service;
