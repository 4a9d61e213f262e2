//! Two-point heater thermostat.
//!
//! The heater runs until the kettle reaches the target, then stays off
//! until the temperature sags `heatup_delta` below it.  Between those two
//! points the previous decision is kept, which stops the relay chattering
//! around the set-point.

/// Hysteresis controller for the heater relay.
#[derive(Debug, Clone)]
pub struct Thermostat {
    target: Option<f32>,
    heatup_delta: f32,
    heating: bool,
}

impl Thermostat {
    pub fn new(heatup_delta: f32) -> Self {
        Self {
            target: None,
            heatup_delta: heatup_delta.abs(),
            heating: false,
        }
    }

    /// Change the set-point.  A new target starts out heating; the first
    /// reading decides whether that sticks.
    pub fn set_target(&mut self, target: Option<f32>) {
        self.target = target;
        self.heating = target.is_some();
    }

    pub fn target(&self) -> Option<f32> {
        self.target
    }

    pub fn is_heating(&self) -> bool {
        self.heating
    }

    /// Compute the heater state for the latest reading.  Without a reading
    /// the previous decision holds.
    pub fn compute(&mut self, celsius: Option<f32>) -> bool {
        let Some(target) = self.target else {
            self.heating = false;
            return false;
        };
        if let Some(t) = celsius {
            if t >= target {
                self.heating = false;
            } else if t <= target - self.heatup_delta {
                self.heating = true;
            }
        }
        self.heating
    }

    /// Drop the set-point and switch off.
    pub fn reset(&mut self) {
        self.target = None;
        self.heating = false;
    }
}
