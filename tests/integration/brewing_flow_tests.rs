//! End-to-end brewing runs through `BrewingService` and `BrewController`
//! with mock relays, a simulated thermometer and a real `FileStore`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use brewcore::adapters::file_store::FileStore;
use brewcore::app::commands::BrewCommand;
use brewcore::app::controller::BrewController;
use brewcore::app::events::NotificationKind;
use brewcore::app::gateway::{ConfirmOutcome, ConfirmationGateway, RetryPolicy};
use brewcore::app::ports::{LogStore, RecipeStore, SharedNotifier};
use brewcore::app::service::{BrewingDeps, BrewingService};
use brewcore::config::SystemConfig;
use brewcore::model::{
    BrewingState, HopAddition, HopCookingPlan, MaltAddition, MashingPlan, MessageKind, Position,
    Recipe, State,
};
use brewcore::safety::AbortSignal;
use brewcore::sensors::TemperatureMonitor;
use brewcore::sensors::thermometer::SimThermometer;
use brewcore::Error;

use crate::mock_hw::{mock_actuators, FailingNotifier, Journal, RecordingNotifier};

/// Upper bound for the gateway worker to finish its deliveries.
const DELIVERY: Duration = Duration::from_secs(5);

struct Rig {
    _dir: tempfile::TempDir,
    deps: BrewingDeps,
    store: Arc<FileStore>,
    thermo: SimThermometer,
    notes: Arc<Mutex<RecordingNotifier>>,
    journal: Journal,
}

fn rig() -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        FileStore::open(dir.path().join("recipes"), dir.path().join("logs")).unwrap(),
    );
    let thermo = SimThermometer::new(20.0);
    let abort = AbortSignal::new();
    let (actuators, journal) = mock_actuators(&abort);
    let notes = Arc::new(Mutex::new(RecordingNotifier::default()));
    let notifier: SharedNotifier = notes.clone();
    let deps = BrewingDeps {
        actuators,
        monitor: Arc::new(TemperatureMonitor::new(thermo.clone())),
        gateway: Arc::new(
            ConfirmationGateway::new(
                notifier.clone(),
                RetryPolicy {
                    max_attempts: 3,
                    delay: Duration::ZERO,
                },
            )
            .unwrap(),
        ),
        notifier,
        logs: store.clone(),
        abort,
        beeper: None,
    };
    Rig {
        _dir: dir,
        deps,
        store,
        thermo,
        notes,
        journal,
    }
}

/// Two 600 s rests, a 300 s boil with one addition at 60 s.
fn pilsner() -> Recipe {
    let mut r = Recipe::new("pils", "Pilsner");
    r.mashing = MashingPlan::sequential(&[(45.0, 600), (63.0, 600)]);
    r.hop_cooking = HopCookingPlan {
        duration_secs: 300,
        additions: vec![HopAddition {
            name: "Saaz".into(),
            amount_grams: 20.0,
            input_time_secs: 60,
        }],
    };
    r
}

/// Bring the kettle to `celsius` and let the monitor see it.
fn reach(rig: &Rig, celsius: f32) {
    rig.thermo.set(celsius);
    rig.deps.monitor.poll_once();
}

/// A process with no rests, already waiting for the iodine test.
fn at_iodine_test(rig: &Rig, log_id: i64) -> BrewingService {
    let mut r = pilsner();
    r.mashing = MashingPlan::default();
    let mut svc =
        BrewingService::new(r, log_id, SystemConfig::default(), rig.deps.clone()).unwrap();
    svc.start();
    svc.tick(0.0);
    assert_eq!(svc.state(), State::IodineTest);
    svc
}

#[test]
fn full_run_logs_four_transitions_and_one_hop_addition() {
    let rig = rig();
    let mut svc =
        BrewingService::new(pilsner(), 1, SystemConfig::default(), rig.deps.clone()).unwrap();

    assert_eq!(svc.start(), State::Mashing);
    assert!(rig.deps.actuators.heater.is_switched_on());
    assert!(rig.deps.actuators.stirrer.is_switched_on());

    // Rest 1: the timer only starts once 45 °C is reached.
    svc.tick(600.0);
    assert_eq!(svc.brewing_state().position, Position::Rest(0));
    reach(&rig, 45.0);
    svc.tick(1.0);
    svc.tick(600.0);
    assert_eq!(svc.brewing_state().position, Position::Rest(1));

    // Rest 2.
    reach(&rig, 63.0);
    svc.tick(1.0);
    assert_eq!(svc.tick(600.0), State::IodineTest);
    let status = svc.status();
    assert_eq!(status.state, BrewingState::new(State::IodineTest, Position::Iodine));
    assert!(status.pending_request.is_some());

    // Iodine test blocks until the operator answers.
    svc.tick(3600.0);
    assert_eq!(svc.state(), State::IodineTest);
    svc.confirm_iodine(0).unwrap();
    assert_eq!(svc.state(), State::HopCooking);

    // The boil timer starts at the boil.
    svc.tick(600.0);
    assert_eq!(svc.log().count(MessageKind::HopAddition), 0);
    reach(&rig, 100.0);
    svc.tick(1.0);
    svc.tick(60.0);
    assert_eq!(svc.tick(240.0), State::Done);
    assert!(svc.is_finished());

    let log = svc.log();
    assert!(log.is_closed());
    assert_eq!(log.count(MessageKind::Transition), 4);
    assert_eq!(log.count(MessageKind::HopAddition), 1);
    assert_eq!(log.count(MessageKind::Temperature), 3, "45, 63 and 100 °C");
    assert!(!log.was_aborted());

    assert!(rig.deps.gateway.wait_idle(DELIVERY));
    let notes = rig.notes.lock().unwrap();
    let infos = notes.of_kind(NotificationKind::Info);
    assert_eq!(infos.len(), 1, "addition at 60 s is inside the pre-notice lead");
    assert_eq!(infos[0].payload, "Add 20 g Saaz");
    assert_eq!(notes.of_kind(NotificationKind::Test).len(), 1);
    assert_eq!(notes.of_kind(NotificationKind::Message).len(), 1);
    assert_eq!(notes.cancelled.len(), 1, "the iodine prompt is hidden once");
    drop(notes);

    assert!(!rig.deps.actuators.heater.is_switched_on());
    assert!(!rig.deps.actuators.stirrer.is_switched_on());

    let stored = rig.store.get_log_by_id(1).unwrap();
    assert_eq!(&stored, log);
    assert_eq!(rig.store.next_log_id().unwrap(), 2);
    assert_eq!(rig.deps.monitor.observer_count(), 0);
}

#[test]
fn negative_iodine_test_mashes_on_and_asks_again() {
    let rig = rig();
    let mut r = pilsner();
    r.mashing = MashingPlan::sequential(&[(63.0, 60)]);
    let mut svc = BrewingService::new(r, 0, SystemConfig::default(), rig.deps.clone()).unwrap();
    svc.start();
    reach(&rig, 63.0);
    svc.tick(1.0);
    svc.tick(60.0);
    assert_eq!(svc.state(), State::IodineTest);

    svc.confirm_iodine(120).unwrap();
    assert_eq!(svc.brewing_state().position, Position::IodineRetest);
    assert!(svc.confirm_iodine(0).is_err(), "no prompt during the retest");

    svc.tick(119.0);
    assert_eq!(svc.brewing_state().position, Position::IodineRetest);
    svc.tick(1.0);
    assert_eq!(svc.brewing_state().position, Position::Iodine);
    svc.tick(0.0);
    assert!(svc.status().pending_request.is_some());

    svc.confirm_iodine(0).unwrap();
    assert_eq!(svc.state(), State::HopCooking);
    assert!(rig.deps.gateway.wait_idle(DELIVERY));
    assert_eq!(rig.notes.lock().unwrap().of_kind(NotificationKind::Test).len(), 2);
}

#[test]
fn pre_notice_fires_ahead_of_a_late_addition() {
    let rig = rig();
    let mut r = pilsner();
    r.mashing = MashingPlan::default();
    r.hop_cooking = HopCookingPlan {
        duration_secs: 3600,
        additions: vec![HopAddition {
            name: "Cascade".into(),
            amount_grams: 40.0,
            input_time_secs: 3000,
        }],
    };
    let mut svc = BrewingService::new(r, 0, SystemConfig::default(), rig.deps.clone()).unwrap();
    svc.start();
    svc.tick(0.0);
    svc.confirm_iodine(0).unwrap();
    assert_eq!(svc.state(), State::HopCooking);
    reach(&rig, 100.0);
    svc.tick(0.0);

    svc.tick(2820.0);
    let infos: Vec<String> = rig
        .notes
        .lock()
        .unwrap()
        .of_kind(NotificationKind::Info)
        .iter()
        .map(|n| n.payload.clone())
        .collect();
    assert_eq!(infos, vec!["In 180s: add 40 g Cascade".to_string()]);

    svc.tick(180.0);
    assert_eq!(svc.log().count(MessageKind::HopAddition), 1);
}

#[test]
fn cancel_turns_everything_off_and_saves_an_aborted_log() {
    let rig = rig();
    let mut svc =
        BrewingService::new(pilsner(), 3, SystemConfig::default(), rig.deps.clone()).unwrap();
    svc.start();
    svc.cancel();

    assert_eq!(svc.state(), State::Aborted);
    assert!(!rig.deps.actuators.heater.is_switched_on());
    assert!(!rig.deps.actuators.stirrer.is_switched_on());
    assert!(!rig.deps.abort.is_raised(), "operator cancel does not latch");
    assert_eq!(rig.deps.monitor.listener_count(), 0);

    let stored = rig.store.get_log_by_id(3).unwrap();
    assert!(stored.was_aborted());
    assert!(stored.summary().title.ends_with("(aborted)"));

    let last = rig.journal.lock().unwrap().last().cloned().unwrap();
    assert!(!last.on);

    svc.cancel();
    assert_eq!(svc.log().count(MessageKind::Abort), 1);
}

#[test]
fn controller_runs_one_process_at_a_time() {
    let rig = rig();
    rig.store.save_recipe(&pilsner()).unwrap();
    let config = SystemConfig {
        control_loop_interval_ms: 100,
        ..Default::default()
    };
    let controller = BrewController::new(config, rig.deps.clone(), rig.store.clone());

    assert!(matches!(
        controller.handle_command(BrewCommand::Cancel),
        Err(Error::NotFound(_))
    ));

    let log_id = controller.start_recipe("pils").unwrap();
    assert_eq!(log_id, 1);
    assert!(controller.is_running());
    assert!(matches!(
        controller.start_recipe("pils"),
        Err(Error::AlreadyRunning)
    ));
    assert!(matches!(
        controller.handle_command(BrewCommand::ConfirmIodine { duration: 0 }),
        Err(Error::InvalidStep(_))
    ));

    controller.handle_command(BrewCommand::Cancel).unwrap();
    assert_eq!(
        controller.wait_for_completion(Duration::from_secs(5)),
        Some(State::Aborted)
    );
    assert!(controller.saved_log().is_some());

    // A finished process makes room for the next one.
    assert_eq!(controller.start_recipe("pils").unwrap(), 2);
    controller.shutdown();
}

#[test]
fn controller_refuses_to_start_after_a_fail_safe_shutdown() {
    let rig = rig();
    rig.deps.abort.raise("watchdog: brewing server unreachable");
    let controller =
        BrewController::new(SystemConfig::default(), rig.deps.clone(), rig.store.clone());
    assert!(matches!(
        controller.start_brewing(pilsner()),
        Err(Error::FailSafeLatched)
    ));
    assert!(controller.status().is_none());
}

#[test]
fn repeated_iodine_confirmation_is_a_no_op() {
    let rig = rig();
    let mut svc = at_iodine_test(&rig, 1);
    let id = svc.status().pending_request.unwrap();
    assert!(rig.deps.gateway.wait_idle(DELIVERY));

    svc.confirm_iodine(0).unwrap();
    assert_eq!(svc.state(), State::HopCooking);
    let transitions = svc.log().count(MessageKind::Transition);

    assert!(matches!(svc.confirm_iodine(0), Err(Error::InvalidStep(_))));
    assert_eq!(rig.deps.gateway.confirm_with(id, 0).unwrap(), ConfirmOutcome::Stale);
    svc.tick(0.0);

    assert_eq!(svc.state(), State::HopCooking);
    assert_eq!(svc.log().count(MessageKind::Transition), transitions);
    assert_eq!(svc.log().count(MessageKind::Confirmation), 1);
    assert!(rig.deps.gateway.wait_idle(DELIVERY));
    let notes = rig.notes.lock().unwrap();
    assert_eq!(notes.of_kind(NotificationKind::Test).len(), 1);
    assert_eq!(notes.cancelled, vec![id]);
}

#[test]
fn cold_kettle_never_finishes_the_boil() {
    let rig = rig();
    let mut svc = at_iodine_test(&rig, 1);
    svc.confirm_iodine(0).unwrap();
    assert_eq!(svc.state(), State::HopCooking);

    reach(&rig, 80.0);
    for _ in 0..20 {
        assert_eq!(svc.tick(600.0), State::HopCooking);
    }
    assert!(rig.deps.actuators.heater.is_switched_on());
    assert_eq!(svc.log().count(MessageKind::HopAddition), 0);

    reach(&rig, 99.5);
    svc.tick(0.0);
    svc.tick(60.0);
    assert_eq!(svc.log().count(MessageKind::HopAddition), 1);
    assert_eq!(svc.tick(240.0), State::Done);
}

#[test]
fn failing_notifier_does_not_stall_the_control_loop() {
    let mut rig = rig();
    let channel = Arc::new(Mutex::new(FailingNotifier::unreachable(100)));
    let notifier: SharedNotifier = channel.clone();
    rig.deps.gateway = Arc::new(
        ConfirmationGateway::new(
            notifier.clone(),
            RetryPolicy {
                max_attempts: 3,
                delay: Duration::from_secs(1),
            },
        )
        .unwrap(),
    );
    rig.deps.notifier = notifier;

    let started = Instant::now();
    let mut svc = at_iodine_test(&rig, 1);
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "ticking into the iodine test took {:?}",
        started.elapsed()
    );
    let id = svc.status().pending_request.unwrap();
    assert!(!rig.deps.gateway.delivery_failed(id));

    assert!(rig.deps.gateway.wait_idle(DELIVERY));
    assert!(rig.deps.gateway.delivery_failed(id));
    assert_eq!(channel.lock().unwrap().attempts, 3);

    // The request stays answerable without a visible prompt.
    svc.confirm_iodine(0).unwrap();
    assert_eq!(svc.state(), State::HopCooking);
}

#[test]
fn due_malt_is_prompted_and_confirmed_during_mashing() {
    let rig = rig();
    let mut r = pilsner();
    r.mashing = MashingPlan::sequential(&[(63.0, 600)]);
    r.mashing.malt_additions = vec![MaltAddition {
        name: "Munich".into(),
        amount_grams: 500.0,
        input_time_secs: 300,
    }];
    let mut svc = BrewingService::new(r, 1, SystemConfig::default(), rig.deps.clone()).unwrap();
    svc.start();
    reach(&rig, 63.0);
    svc.tick(1.0);
    svc.tick(300.0);

    let gated = BrewingState::new(State::Mashing, Position::MaltAddition);
    assert_eq!(svc.brewing_state(), gated);
    assert!(svc.status().pending_request.is_some());

    // The rest runs out but mashing waits for the malt.
    svc.tick(300.0);
    assert_eq!(svc.state(), State::Mashing);

    svc.confirm_step(gated).unwrap();
    assert_eq!(svc.log().count(MessageKind::MaltAddition), 1);
    svc.tick(0.0);
    assert_eq!(svc.state(), State::IodineTest);
    assert!(svc.confirm_step(gated).is_err());

    assert!(rig.deps.gateway.wait_idle(DELIVERY));
    let notes = rig.notes.lock().unwrap();
    let infos: Vec<&str> = notes
        .of_kind(NotificationKind::Info)
        .iter()
        .map(|n| n.payload.as_str())
        .collect();
    assert_eq!(infos.last().copied(), Some("Add 500 g Munich"));
    let prompts = notes.of_kind(NotificationKind::Test);
    assert_eq!(prompts.len(), 2, "malt prompt, then the iodine test");
    assert_eq!(prompts[0].payload, "Add the due malt and confirm");
}
