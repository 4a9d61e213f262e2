//! Thermometer drivers.
//!
//! [`W1Thermometer`] reads a DS18B20 through the Linux 1-Wire sysfs
//! interface.  The `w1_slave` file looks like:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! The first line must end in `YES` (CRC passed); the second carries the
//! temperature in milli-degrees.  Values are rounded to 0.1 °C.
//!
//! [`SimThermometer`] and [`SimKettle`] are host-side stand-ins for tests
//! and for running without hardware.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use log::{info, warn};

use crate::app::ports::TemperatureReader;
use crate::drivers::Actuator;
use crate::error::{Error, Result, SensorError};

// ───────────────────────────────────────────────────────────────
// 1-Wire DS18B20
// ───────────────────────────────────────────────────────────────

const W1_FAMILY_PREFIX: &str = "28-";
const W1_SLAVE_FILE: &str = "w1_slave";

pub struct W1Thermometer {
    path: PathBuf,
}

impl W1Thermometer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the first `28-*` device under `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            warn!("Thermometer: cannot list {}: {}", dir.display(), e);
            Error::Init("1-Wire device directory unreadable")
        })?;

        let mut devices: Vec<PathBuf> = entries
            .filter_map(core::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(W1_FAMILY_PREFIX))
            .map(|e| e.path().join(W1_SLAVE_FILE))
            .collect();
        devices.sort();

        let path = devices
            .into_iter()
            .next()
            .ok_or(Error::Init("no 1-Wire thermometer found"))?;
        info!("Thermometer: using {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemperatureReader for W1Thermometer {
    fn read_temperature(&mut self) -> core::result::Result<f32, SensorError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|_| SensorError::Unavailable)?;
        parse_w1_slave(&raw)
    }
}

/// Decode the contents of a `w1_slave` file.
pub fn parse_w1_slave(raw: &str) -> core::result::Result<f32, SensorError> {
    let mut lines = raw.lines();
    let crc_line = lines.next().ok_or(SensorError::Malformed)?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(SensorError::Malformed);
    }
    let data_line = lines.next().ok_or(SensorError::Malformed)?;
    let (_, milli) = data_line.rsplit_once("t=").ok_or(SensorError::Malformed)?;
    let milli: i32 = milli.trim().parse().map_err(|_| SensorError::Malformed)?;

    #[allow(clippy::cast_precision_loss)]
    let celsius = milli as f32 / 1000.0;
    Ok((celsius * 10.0).round() / 10.0)
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SimState {
    celsius: f32,
    failure: Option<SensorError>,
}

/// Settable thermometer.  Clones share one reading.
#[derive(Debug, Clone)]
pub struct SimThermometer {
    state: Arc<Mutex<SimState>>,
}

impl SimThermometer {
    pub fn new(celsius: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                celsius,
                failure: None,
            })),
        }
    }

    pub fn set(&self, celsius: f32) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .celsius = celsius;
    }

    /// Make subsequent reads fail with `failure`; `None` heals the sensor.
    pub fn fail(&self, failure: Option<SensorError>) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failure = failure;
    }
}

impl TemperatureReader for SimThermometer {
    fn read_temperature(&mut self) -> core::result::Result<f32, SensorError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.failure {
            Some(e) => Err(e),
            None => Ok(state.celsius),
        }
    }
}

/// Pot of water that warms while the heater is on and cools towards
/// ambient otherwise.  Rates are in °C per second of wall time.
pub struct SimKettle {
    heater: Actuator,
    celsius: f32,
    ambient: f32,
    heat_rate: f32,
    cool_rate: f32,
    last: Instant,
}

impl SimKettle {
    pub fn new(heater: Actuator, start_celsius: f32) -> Self {
        Self {
            heater,
            celsius: start_celsius,
            ambient: start_celsius,
            heat_rate: 1.0,
            cool_rate: 0.05,
            last: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_rates(mut self, heat_rate: f32, cool_rate: f32) -> Self {
        self.heat_rate = heat_rate;
        self.cool_rate = cool_rate;
        self
    }
}

impl TemperatureReader for SimKettle {
    fn read_temperature(&mut self) -> core::result::Result<f32, SensorError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;

        if self.heater.is_switched_on() {
            self.celsius = (self.celsius + self.heat_rate * dt).min(100.0);
        } else {
            let cooled = self.celsius - self.cool_rate * dt;
            self.celsius = cooled.max(self.ambient);
        }
        Ok((self.celsius * 10.0).round() / 10.0)
    }
}
