//! Confirmation gateway against failing and recording notification channels.

use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use brewcore::app::events::NotificationKind;
use brewcore::app::gateway::{ConfirmOutcome, ConfirmationGateway, RequestStatus, RetryPolicy};
use brewcore::app::ports::SharedNotifier;
use brewcore::model::Position;

use crate::mock_hw::{FailingNotifier, RecordingNotifier};

const DELIVERY: Duration = Duration::from_secs(5);

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::from_millis(1),
    }
}

fn gateway(notifier: SharedNotifier, max_attempts: u32) -> ConfirmationGateway {
    ConfirmationGateway::new(notifier, policy(max_attempts)).unwrap()
}

#[test]
fn unreachable_channel_is_retried_up_to_the_limit() {
    let channel = Arc::new(Mutex::new(FailingNotifier::unreachable(2)));
    let notifier: SharedNotifier = channel.clone();
    let gw = gateway(notifier, 3);

    let id = gw.request_confirmation(Position::Iodine);
    assert!(gw.wait_idle(DELIVERY));
    assert!(gw.is_notification_visible(id));
    assert!(!gw.delivery_failed(id));
    let channel = channel.lock().unwrap();
    assert_eq!(channel.attempts, 3);
    assert_eq!(channel.delivered, 1);
}

#[test]
fn rejected_delivery_is_not_retried() {
    let channel = Arc::new(Mutex::new(FailingNotifier::rejecting()));
    let notifier: SharedNotifier = channel.clone();
    let gw = gateway(notifier, 5);

    let id = gw.request_confirmation(Position::Iodine);
    assert!(gw.wait_idle(DELIVERY));
    assert_eq!(channel.lock().unwrap().attempts, 1);
    assert!(gw.delivery_failed(id));
    assert_eq!(gw.status(id), Some(RequestStatus::Pending));
    assert_eq!(gw.outstanding(Position::Iodine), Some(id));
}

#[test]
fn concurrent_confirmations_resolve_exactly_once() {
    let rec = Arc::new(Mutex::new(RecordingNotifier::default()));
    let notifier: SharedNotifier = rec.clone();
    let gw = Arc::new(gateway(notifier, 1));
    let id = gw.request_confirmation(Position::Iodine);
    assert!(gw.wait_idle(DELIVERY));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let gw = Arc::clone(&gw);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                gw.confirm_with(id, i as i64).unwrap()
            })
        })
        .collect();
    let outcomes: Vec<ConfirmOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let confirmed = outcomes
        .iter()
        .filter(|o| **o == ConfirmOutcome::Confirmed)
        .count();
    assert_eq!(confirmed, 1);
    assert!(gw.resolution(id).is_some());

    let rec = rec.lock().unwrap();
    assert_eq!(rec.of_kind(NotificationKind::Test).len(), 1);
    assert_eq!(rec.cancelled, vec![id]);
}

#[test]
fn confirm_racing_the_delivery_hides_the_prompt_once() {
    let rec = Arc::new(Mutex::new(RecordingNotifier::default()));
    let notifier: SharedNotifier = rec.clone();
    let gw = gateway(notifier, 1);

    // Confirm before the worker is known to have delivered: whichever side
    // finishes last hides the prompt.
    let id = gw.request_confirmation(Position::Iodine);
    assert_eq!(gw.confirm(id).unwrap(), ConfirmOutcome::Confirmed);
    assert!(gw.wait_idle(DELIVERY));

    let rec = rec.lock().unwrap();
    assert!(rec.cancelled.len() <= 1);
    assert_eq!(rec.cancelled.len(), rec.of_kind(NotificationKind::Test).len());
    assert!(!gw.is_notification_visible(id));
}

#[test]
fn aborting_a_process_leaves_no_settled_requests() {
    let rec = Arc::new(Mutex::new(RecordingNotifier::default()));
    let notifier: SharedNotifier = rec.clone();
    let gw = gateway(notifier, 1);

    let resolved = gw.request_confirmation(Position::Iodine);
    gw.confirm(resolved).unwrap();
    let open = gw.request_confirmation(Position::MaltAddition);
    assert!(gw.wait_idle(DELIVERY));
    assert_eq!(gw.tracked(), 2);

    assert_eq!(gw.withdraw_all(), 1);
    assert_eq!(gw.tracked(), 0);
    assert_eq!(gw.status(open), None);
    assert!(matches!(gw.confirm(open), Err(brewcore::Error::NotFound(_))));
    assert_eq!(gw.status(resolved), None);
    assert!(rec.lock().unwrap().cancelled.contains(&open));
}
