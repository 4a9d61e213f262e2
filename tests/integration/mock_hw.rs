//! Mock hardware and channel adapters for integration tests.
//!
//! Records every actuator call in one shared journal so tests can assert
//! on the order of commands across heater, stirrer and signal.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use brewcore::app::events::{Notification, NotificationKind, RequestId};
use brewcore::app::ports::{
    ActuatorControl, DeliveryError, HealthProbe, NotificationPort, ProbeError,
};
use brewcore::drivers::{Actuator, Actuators};
use brewcore::error::ActuatorError;
use brewcore::safety::AbortSignal;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorCall {
    pub name: &'static str,
    pub on: bool,
    /// Whether the abort latch was raised when the call arrived.
    pub abort_raised: bool,
}

pub type Journal = Arc<Mutex<Vec<ActuatorCall>>>;

// ── MockActuator ──────────────────────────────────────────────

pub struct MockActuator {
    name: &'static str,
    on: bool,
    journal: Journal,
    abort: AbortSignal,
}

impl MockActuator {
    pub fn new(name: &'static str, journal: Journal, abort: AbortSignal) -> Self {
        Self {
            name,
            on: false,
            journal,
            abort,
        }
    }

    fn record(&mut self, on: bool) {
        self.on = on;
        self.journal.lock().unwrap().push(ActuatorCall {
            name: self.name,
            on,
            abort_raised: self.abort.is_raised(),
        });
    }
}

impl ActuatorControl for MockActuator {
    fn switch_on(&mut self) -> Result<(), ActuatorError> {
        self.record(true);
        Ok(())
    }

    fn switch_off(&mut self) -> Result<(), ActuatorError> {
        self.record(false);
        Ok(())
    }

    fn is_switched_on(&self) -> bool {
        self.on
    }
}

/// Heater, stirrer and signal mocks sharing one journal.
pub fn mock_actuators(abort: &AbortSignal) -> (Actuators, Journal) {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let make = |name| Actuator::new(name, MockActuator::new(name, journal.clone(), abort.clone()));
    let actuators = Actuators {
        heater: make("heater"),
        stirrer: make("stirrer"),
        signal: make("signal"),
    };
    (actuators, journal)
}

// ── RecordingNotifier ─────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Vec<Notification>,
    pub cancelled: Vec<RequestId>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn of_kind(&self, kind: NotificationKind) -> Vec<&Notification> {
        self.sent.iter().filter(|n| n.kind == kind).collect()
    }
}

impl NotificationPort for RecordingNotifier {
    fn send(&mut self, notification: &Notification) -> Result<(), DeliveryError> {
        self.sent.push(notification.clone());
        Ok(())
    }

    fn cancel(&mut self, request: RequestId) {
        self.cancelled.push(request);
    }
}

// ── FailingNotifier ───────────────────────────────────────────

/// Fails the first `failures` sends with `error`, then delivers.
pub struct FailingNotifier {
    pub failures: u32,
    pub error: DeliveryError,
    pub attempts: u32,
    pub delivered: u32,
}

#[allow(dead_code)]
impl FailingNotifier {
    pub fn unreachable(failures: u32) -> Self {
        Self {
            failures,
            error: DeliveryError::Unreachable("no route to device".into()),
            attempts: 0,
            delivered: 0,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            failures: u32::MAX,
            error: DeliveryError::Rejected("unknown device token".into()),
            attempts: 0,
            delivered: 0,
        }
    }
}

impl NotificationPort for FailingNotifier {
    fn send(&mut self, _notification: &Notification) -> Result<(), DeliveryError> {
        self.attempts += 1;
        if self.attempts <= self.failures {
            return Err(self.error.clone());
        }
        self.delivered += 1;
        Ok(())
    }

    fn cancel(&mut self, _request: RequestId) {}
}

// ── ScriptedProbe ─────────────────────────────────────────────

/// Answers from a script; healthy once the script runs out.
pub struct ScriptedProbe {
    script: VecDeque<Result<(), ProbeError>>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl ScriptedProbe {
    pub fn new(script: impl IntoIterator<Item = Result<(), ProbeError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always_down() -> Self {
        Self::new(std::iter::repeat_n(
            Err(ProbeError::Transport("connection refused".into())),
            64,
        ))
    }
}

impl HealthProbe for ScriptedProbe {
    fn probe(&mut self, address: &str) -> Result<(), ProbeError> {
        self.calls.lock().unwrap().push(address.to_string());
        self.script.pop_front().unwrap_or(Ok(()))
    }
}
