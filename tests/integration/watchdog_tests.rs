//! Security watchdog: failure counting and fail-safe shutdown order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use brewcore::app::ports::ProbeError;
use brewcore::safety::{AbortSignal, SecurityWatchdog, WatchdogSettings};

use crate::mock_hw::{ActuatorCall, ScriptedProbe, mock_actuators};

fn settings(failures_until_alert: u32) -> WatchdogSettings {
    WatchdogSettings {
        address: "http://brew.local/info".into(),
        interval: Duration::from_millis(10),
        failures_until_alert,
    }
}

fn down() -> Result<(), ProbeError> {
    Err(ProbeError::Transport("connection refused".into()))
}

#[test]
fn two_failures_shut_down_in_order() {
    let abort = AbortSignal::new();
    let (actuators, journal) = mock_actuators(&abort);
    actuators.heater.switch_on().unwrap();
    actuators.stirrer.switch_on().unwrap();
    journal.lock().unwrap().clear();

    let wd = SecurityWatchdog::new(
        settings(2),
        actuators.clone(),
        abort.clone(),
        ScriptedProbe::new([down(), down()]),
    );
    assert!(!wd.run_once());
    assert_eq!(wd.failure_count(), 1);
    assert!(!abort.is_raised());

    assert!(wd.run_once());
    assert!(wd.is_cancelled());
    assert!(abort.is_raised());

    let calls = journal.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            ActuatorCall {
                name: "heater",
                on: false,
                abort_raised: true,
            },
            ActuatorCall {
                name: "stirrer",
                on: false,
                abort_raised: true,
            },
            ActuatorCall {
                name: "signal",
                on: true,
                abort_raised: true,
            },
        ]
    );
    assert!(actuators.signal.is_switched_on());
}

#[test]
fn a_success_resets_the_failure_count() {
    let abort = AbortSignal::new();
    let (actuators, journal) = mock_actuators(&abort);
    let wd = SecurityWatchdog::new(
        settings(2),
        actuators,
        abort.clone(),
        ScriptedProbe::new([down(), Ok(()), down(), Ok(())]),
    );
    for _ in 0..4 {
        assert!(!wd.run_once());
    }
    assert_eq!(wd.failure_count(), 0);
    assert!(!wd.is_cancelled());
    assert!(!abort.is_raised());
    assert!(journal.lock().unwrap().is_empty());
}

#[test]
fn cancelled_watchdog_never_resumes() {
    let abort = AbortSignal::new();
    let (actuators, journal) = mock_actuators(&abort);
    let probe = ScriptedProbe::always_down();
    let calls = Arc::clone(&probe.calls);
    let wd = SecurityWatchdog::new(settings(1), actuators, abort, probe);

    assert!(wd.run_once());
    let after_shutdown = journal.lock().unwrap().len();
    assert!(!wd.run_once());
    wd.shutdown();
    assert_eq!(journal.lock().unwrap().len(), after_shutdown);
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[test]
fn probe_loop_stops_itself_after_shutdown() {
    let abort = AbortSignal::new();
    let (actuators, _journal) = mock_actuators(&abort);
    let wd = SecurityWatchdog::new(
        settings(2),
        actuators,
        abort.clone(),
        ScriptedProbe::always_down(),
    );
    let handle = wd.spawn().unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(handle.is_finished());
    handle.join().unwrap();
    assert!(wd.is_cancelled());
    assert!(abort.is_raised());
}
