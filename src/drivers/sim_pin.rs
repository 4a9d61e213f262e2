//! Host-side output pin.
//!
//! Stands in for a GPIO line when no relay board is attached.  Clones share
//! the same level, so a test (or the simulated kettle) can keep one clone and
//! observe what the driver wrote through the other.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin, StatefulOutputPin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPinError;

impl digital::Error for SimPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimPin {
    high: Arc<AtomicBool>,
    fail: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.high.load(Ordering::Acquire)
    }

    /// Make every subsequent write fail (fault injection).
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::Release);
    }

    fn write(&self, high: bool) -> Result<(), SimPinError> {
        if self.fail.load(Ordering::Acquire) {
            return Err(SimPinError);
        }
        self.high.store(high, Ordering::Release);
        Ok(())
    }
}

impl ErrorType for SimPin {
    type Error = SimPinError;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true)
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(SimPin::is_high(self))
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!SimPin::is_high(self))
    }
}
