//! Confirmation gateway: operator prompts with at-most-once resolution.
//!
//! A request is created per gated position and its prompt is queued for a
//! delivery worker, so [`ConfirmationGateway::request_confirmation`]
//! returns at once.  The worker sends through the shared
//! [`NotificationPort`](super::ports::NotificationPort) with a bounded
//! retry and never holds the request table and the notifier at the same
//! time.  A retry pause is cut short as soon as the request is settled.
//!
//! ## Request lifecycle
//!
//! ```text
//!            confirm / confirm_with
//!  Pending ─────────────────────────▶ Resolved { waiting_secs }
//!     │
//!     └──── withdraw / withdraw_all ─▶ Withdrawn
//! ```
//!
//! Only the first confirm of a pending request counts; it also hides the
//! visible prompt, exactly once.  A prompt delivered after its request was
//! settled is hidden by the worker.  When every delivery attempt fails the
//! prompt is marked as never shown but the request stays pending, so a
//! confirm through another path still resolves it.
//!
//! Settled requests are kept until [`ConfirmationGateway::prune`] drops
//! them; `withdraw_all` prunes on its way out.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use super::events::{Notification, NotificationKind, RequestId};
use super::ports::{DeliveryError, NotificationPort, SharedNotifier};
use crate::config::SystemConfig;
use crate::drivers::task::spawn_worker;
use crate::error::{Error, Result};
use crate::model::Position;

// ───────────────────────────────────────────────────────────────
// Public types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            max_attempts: config.confirmation_max_attempts.max(1),
            delay: Duration::from_millis(u64::from(config.confirmation_retry_delay_ms)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SystemConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Resolved { waiting_secs: i64 },
    Withdrawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// This call resolved the request.
    Confirmed,
    /// The request was already resolved or withdrawn; nothing changed.
    Stale,
}

// ───────────────────────────────────────────────────────────────
// Shared state
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Request {
    position: Position,
    status: RequestStatus,
    /// The prompt is currently shown on the operator's device.
    visible: bool,
    delivery_failed: bool,
}

#[derive(Debug)]
struct Table {
    next_id: u64,
    requests: HashMap<RequestId, Request>,
    queue: VecDeque<(RequestId, Notification)>,
    /// Prompts queued or being delivered.
    in_flight: usize,
    shutdown: bool,
}

impl Table {
    fn is_pending(&self, id: RequestId) -> bool {
        self.requests
            .get(&id)
            .is_some_and(|r| r.status == RequestStatus::Pending)
    }
}

struct Shared {
    notifier: SharedNotifier,
    policy: RetryPolicy,
    table: Mutex<Table>,
    /// Signalled on new work, on every settle and when a delivery ends.
    wake: Condvar,
}

impl Shared {
    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notifier(&self) -> MutexGuard<'_, dyn NotificationPort + Send + 'static> {
        self.notifier.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Delivery {
    Shown,
    Failed,
    /// The request was settled before the prompt went out.
    Skipped,
}

// ───────────────────────────────────────────────────────────────
// Gateway
// ───────────────────────────────────────────────────────────────

pub struct ConfirmationGateway {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl ConfirmationGateway {
    /// Start the delivery worker.
    pub fn new(notifier: SharedNotifier, policy: RetryPolicy) -> Result<Self> {
        let shared = Arc::new(Shared {
            notifier,
            policy,
            table: Mutex::new(Table {
                next_id: 1,
                requests: HashMap::new(),
                queue: VecDeque::new(),
                in_flight: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = spawn_worker("gateway-delivery", move || run_worker(&worker_shared))?;
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.shared.table()
    }

    /// Open (or reuse) the pending request for `position` and queue its
    /// prompt.  Returns without waiting for the delivery.
    pub fn request_confirmation(&self, position: Position) -> RequestId {
        let mut table = self.table();
        if let Some(existing) = pending_for(&table, position) {
            debug!("Gateway: {} already pending for {:?}", existing, position);
            return existing;
        }
        let id = RequestId(table.next_id);
        table.next_id += 1;
        table.requests.insert(
            id,
            Request {
                position,
                status: RequestStatus::Pending,
                visible: false,
                delivery_failed: false,
            },
        );

        let mut prompt = Notification::new(NotificationKind::Test, prompt_text(position));
        prompt.request = Some(id);
        table.queue.push_back((id, prompt));
        table.in_flight += 1;
        info!("Gateway: requesting confirmation {} for {:?}", id, position);
        self.shared.wake.notify_all();
        id
    }

    /// Resolve a request with no waiting time.
    pub fn confirm(&self, id: RequestId) -> Result<ConfirmOutcome> {
        self.confirm_with(id, 0)
    }

    /// Resolve a request carrying the operator's waiting duration.
    pub fn confirm_with(&self, id: RequestId, waiting_secs: i64) -> Result<ConfirmOutcome> {
        let was_visible = {
            let mut table = self.table();
            let req = table
                .requests
                .get_mut(&id)
                .ok_or_else(|| Error::NotFound(format!("confirmation request {id}")))?;
            if req.status != RequestStatus::Pending {
                debug!("Gateway: {} already settled ({:?})", id, req.status);
                return Ok(ConfirmOutcome::Stale);
            }
            req.status = RequestStatus::Resolved { waiting_secs };
            core::mem::replace(&mut req.visible, false)
        };
        self.shared.wake.notify_all();
        info!("Gateway: {} confirmed (waiting {}s)", id, waiting_secs);
        if was_visible {
            self.shared.notifier().cancel(id);
        }
        Ok(ConfirmOutcome::Confirmed)
    }

    /// Withdraw one pending request.  Returns `false` if it was not pending.
    pub fn withdraw(&self, id: RequestId) -> bool {
        let was_visible = {
            let mut table = self.table();
            match table.requests.get_mut(&id) {
                Some(req) if req.status == RequestStatus::Pending => {
                    req.status = RequestStatus::Withdrawn;
                    Some(core::mem::replace(&mut req.visible, false))
                }
                _ => None,
            }
        };
        self.shared.wake.notify_all();
        match was_visible {
            Some(true) => {
                self.shared.notifier().cancel(id);
                true
            }
            Some(false) => true,
            None => false,
        }
    }

    /// Withdraw every pending request, hide their prompts and drop every
    /// settled request.
    pub fn withdraw_all(&self) -> usize {
        let (withdrawn, to_cancel) = {
            let mut table = self.table();
            let mut withdrawn = 0;
            let mut to_cancel = Vec::new();
            for (id, req) in &mut table.requests {
                if req.status == RequestStatus::Pending {
                    req.status = RequestStatus::Withdrawn;
                    withdrawn += 1;
                    if core::mem::replace(&mut req.visible, false) {
                        to_cancel.push(*id);
                    }
                }
            }
            (withdrawn, to_cancel)
        };
        self.shared.wake.notify_all();
        if !to_cancel.is_empty() {
            let mut notifier = self.shared.notifier();
            for id in to_cancel {
                notifier.cancel(id);
            }
        }
        if withdrawn > 0 {
            info!("Gateway: withdrew {} pending request(s)", withdrawn);
        }
        self.prune();
        withdrawn
    }

    /// Forget every resolved or withdrawn request.  Returns how many were
    /// dropped.
    pub fn prune(&self) -> usize {
        let mut table = self.table();
        let before = table.requests.len();
        table
            .requests
            .retain(|_, r| r.status == RequestStatus::Pending);
        let pruned = before - table.requests.len();
        if pruned > 0 {
            debug!("Gateway: pruned {} settled request(s)", pruned);
        }
        pruned
    }

    /// Block until no prompt is queued or being delivered.  Returns `false`
    /// if `timeout` passed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let table = self.table();
        let (table, _) = self
            .shared
            .wake
            .wait_timeout_while(table, timeout, |t| t.in_flight > 0)
            .unwrap_or_else(PoisonError::into_inner);
        table.in_flight == 0
    }

    /// Waiting duration of a resolved request.
    pub fn resolution(&self, id: RequestId) -> Option<i64> {
        match self.status(id)? {
            RequestStatus::Resolved { waiting_secs } => Some(waiting_secs),
            _ => None,
        }
    }

    pub fn status(&self, id: RequestId) -> Option<RequestStatus> {
        self.table().requests.get(&id).map(|r| r.status)
    }

    /// The pending request for `position`, if any.
    pub fn outstanding(&self, position: Position) -> Option<RequestId> {
        pending_for(&self.table(), position)
    }

    /// Number of requests the table still tracks, settled ones included.
    pub fn tracked(&self) -> usize {
        self.table().requests.len()
    }

    pub fn is_notification_visible(&self, id: RequestId) -> bool {
        self.table().requests.get(&id).is_some_and(|r| r.visible)
    }

    pub fn delivery_failed(&self, id: RequestId) -> bool {
        self.table()
            .requests
            .get(&id)
            .is_some_and(|r| r.delivery_failed)
    }
}

impl Drop for ConfirmationGateway {
    fn drop(&mut self) {
        self.table().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Delivery worker
// ───────────────────────────────────────────────────────────────

fn run_worker(shared: &Shared) {
    loop {
        let (id, prompt) = {
            let mut table = shared.table();
            loop {
                if table.shutdown {
                    return;
                }
                if let Some(job) = table.queue.pop_front() {
                    break job;
                }
                table = shared.wake.wait(table).unwrap_or_else(PoisonError::into_inner);
            }
        };

        let outcome = deliver(shared, id, &prompt);
        let cancel_now = {
            let mut table = shared.table();
            match (outcome, table.requests.get_mut(&id)) {
                (Delivery::Shown, Some(req)) if req.status == RequestStatus::Pending => {
                    req.visible = true;
                    false
                }
                // Settled or pruned while the prompt was on its way.
                (Delivery::Shown, _) => true,
                (Delivery::Failed, Some(req)) if req.status == RequestStatus::Pending => {
                    req.delivery_failed = true;
                    warn!(
                        "Gateway: {} could not be delivered, request stays pending",
                        id
                    );
                    false
                }
                _ => false,
            }
        };
        if cancel_now {
            shared.notifier().cancel(id);
        }

        let mut table = shared.table();
        table.in_flight = table.in_flight.saturating_sub(1);
        shared.wake.notify_all();
    }
}

fn deliver(shared: &Shared, id: RequestId, prompt: &Notification) -> Delivery {
    let max_attempts = shared.policy.max_attempts;
    for attempt in 1..=max_attempts {
        if !shared.table().is_pending(id) {
            debug!("Gateway: {} settled, not delivering", id);
            return Delivery::Skipped;
        }
        let result = shared.notifier().send(prompt);
        match result {
            Ok(()) => return Delivery::Shown,
            Err(DeliveryError::Rejected(msg)) => {
                warn!("Gateway: notification rejected: {}", msg);
                return Delivery::Failed;
            }
            Err(e) => {
                warn!(
                    "Gateway: delivery attempt {}/{} failed: {}",
                    attempt, max_attempts, e
                );
                if attempt < max_attempts && !pause(shared, id) {
                    return Delivery::Skipped;
                }
            }
        }
    }
    Delivery::Failed
}

/// Wait out the retry delay.  Returns `false` when the request was settled
/// or the gateway is shutting down in the meantime.
fn pause(shared: &Shared, id: RequestId) -> bool {
    let table = shared.table();
    let (table, _) = shared
        .wake
        .wait_timeout_while(table, shared.policy.delay, |t| {
            !t.shutdown && t.is_pending(id)
        })
        .unwrap_or_else(PoisonError::into_inner);
    !table.shutdown && table.is_pending(id)
}

fn pending_for(table: &Table, position: Position) -> Option<RequestId> {
    table
        .requests
        .iter()
        .find(|(_, r)| r.position == position && r.status == RequestStatus::Pending)
        .map(|(id, _)| *id)
}

fn prompt_text(position: Position) -> String {
    match position {
        Position::Iodine => "Perform the iodine test and report the result".to_string(),
        Position::MaltAddition => "Add the due malt and confirm".to_string(),
        other => format!("Confirm step {other:?}"),
    }
}
