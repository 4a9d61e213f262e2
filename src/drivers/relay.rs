//! Relay driver for the heater, stirrer and signal outputs.
//!
//! One concrete type for all three outputs; they differ only in polarity.
//! The heater board switches on a LOW level, the stirrer and signal boards
//! on HIGH.  Any `embedded-hal` output pin can back a relay, so the same
//! driver runs against real GPIO and against [`SimPin`](super::sim_pin::SimPin).

use embedded_hal::digital::OutputPin;
use log::debug;

use crate::app::ports::ActuatorControl;
use crate::error::ActuatorError;

pub struct Relay<P> {
    pin: P,
    active_low: bool,
    on: bool,
    label: &'static str,
}

impl<P: OutputPin> Relay<P> {
    /// Wrap `pin` and drive it to the inactive level.
    pub fn new(label: &'static str, pin: P, active_low: bool) -> Result<Self, ActuatorError> {
        let mut relay = Self {
            pin,
            active_low,
            on: false,
            label,
        };
        relay.drive(false)?;
        Ok(relay)
    }

    pub fn heater(pin: P) -> Result<Self, ActuatorError> {
        Self::new("heater", pin, true)
    }

    pub fn stirrer(pin: P) -> Result<Self, ActuatorError> {
        Self::new("stirrer", pin, false)
    }

    pub fn signal(pin: P) -> Result<Self, ActuatorError> {
        Self::new("signal", pin, false)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_active_low(&self) -> bool {
        self.active_low
    }

    fn drive(&mut self, on: bool) -> Result<(), ActuatorError> {
        let high = on != self.active_low;
        let res = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        res.map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.on = on;
        debug!(
            "Relay {}: {} (pin {})",
            self.label,
            if on { "on" } else { "off" },
            if high { "high" } else { "low" }
        );
        Ok(())
    }
}

impl<P: OutputPin> ActuatorControl for Relay<P> {
    fn switch_on(&mut self) -> Result<(), ActuatorError> {
        self.drive(true)
    }

    fn switch_off(&mut self) -> Result<(), ActuatorError> {
        self.drive(false)
    }

    fn is_switched_on(&self) -> bool {
        self.on
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::sim_pin::SimPin;

    #[test]
    fn heater_is_active_low() {
        let pin = SimPin::new();
        let level = pin.clone();
        let mut heater = Relay::heater(pin).unwrap();

        assert!(level.is_high(), "inactive heater must sit high");
        heater.switch_on().unwrap();
        assert!(heater.is_switched_on());
        assert!(!level.is_high());
        heater.switch_off().unwrap();
        assert!(level.is_high());
    }

    #[test]
    fn stirrer_and_signal_are_active_high() {
        for make in [Relay::<SimPin>::stirrer, Relay::<SimPin>::signal] {
            let pin = SimPin::new();
            let level = pin.clone();
            let mut relay = make(pin).unwrap();
            assert!(!level.is_high());
            relay.switch_on().unwrap();
            assert!(level.is_high());
        }
    }

    #[test]
    fn failed_write_keeps_previous_state() {
        let pin = SimPin::new();
        let control = pin.clone();
        let mut relay = Relay::stirrer(pin).unwrap();

        control.fail_writes(true);
        assert_eq!(relay.switch_on(), Err(ActuatorError::GpioWriteFailed));
        assert!(!relay.is_switched_on());
    }
}
