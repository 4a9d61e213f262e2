//! Brewcore library.
//!
//! Drives a brewing kettle through mashing rests, the iodine test gate and
//! the hop cooking schedule, with an independent fail-safe watchdog.
//! Exposes every module for integration testing; `main.rs` wires the
//! host binary.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod logging;
pub mod model;
pub mod safety;
pub mod scheduler;
pub mod sensors;
pub mod validate;

pub use error::{Error, Result};
