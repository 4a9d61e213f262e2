//! Actuator drivers, shared actuator handles and worker helpers.
//!
//! Every physical output sits behind its own mutex.  The brewing process,
//! the beeper and the watchdog all hold clones of the same [`Actuator`]
//! handle, so commands to one output are serialized while different outputs
//! never wait on each other.

pub mod beeper;
pub mod relay;
pub mod sim_pin;
pub mod sysfs_pin;
pub mod task;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::app::ports::ActuatorControl;
use crate::error::ActuatorError;
use crate::safety::AbortSignal;

/// Cloneable, thread-safe handle to one actuator.
#[derive(Clone)]
pub struct Actuator {
    name: &'static str,
    inner: Arc<Mutex<dyn ActuatorControl + Send>>,
}

impl Actuator {
    pub fn new(name: &'static str, control: impl ActuatorControl + Send + 'static) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(control)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, dyn ActuatorControl + Send + 'static> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unconditional command; used by the fail-safe path.
    pub fn switch_on(&self) -> Result<(), ActuatorError> {
        self.lock().switch_on()
    }

    /// Unconditional command; switching off is always safe.
    pub fn switch_off(&self) -> Result<(), ActuatorError> {
        self.lock().switch_off()
    }

    pub fn is_switched_on(&self) -> bool {
        self.lock().is_switched_on()
    }

    /// Switch on unless `abort` is raised.  The flag is checked while the
    /// actuator is locked, so a concurrent fail-safe shutdown either sees
    /// this command finished or prevents it.  Returns `Ok(false)` when skipped.
    pub fn switch_on_guarded(&self, abort: &AbortSignal) -> Result<bool, ActuatorError> {
        let mut control = self.lock();
        if abort.is_raised() {
            return Ok(false);
        }
        control.switch_on()?;
        Ok(true)
    }

    /// Switch off unless `abort` is raised.  Used by the beeper so it never
    /// silences the alarm the watchdog turned on.
    pub fn switch_off_guarded(&self, abort: &AbortSignal) -> Result<bool, ActuatorError> {
        let mut control = self.lock();
        if abort.is_raised() {
            return Ok(false);
        }
        control.switch_off()?;
        Ok(true)
    }
}

impl core::fmt::Debug for Actuator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Actuator")
            .field("name", &self.name)
            .field("on", &self.is_switched_on())
            .finish()
    }
}

/// The three outputs of a brewing system.
#[derive(Debug, Clone)]
pub struct Actuators {
    pub heater: Actuator,
    pub stirrer: Actuator,
    pub signal: Actuator,
}
