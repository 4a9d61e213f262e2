//! Brewing service: one brewing process, from Idle to Done or Aborted.
//!
//! [`BrewingService`] owns the FSM and its blackboard.  Each tick it feeds
//! the context from the outside world, runs the state handlers, and applies
//! what they asked for through the shared handles it was built with.
//!
//! ```text
//!  TemperatureMonitor ──▶ ┌──────────────────────┐ ──▶ Actuators (guarded)
//!  ConfirmationGateway ──▶│    BrewingService    │ ──▶ NotificationPort
//!  AbortSignal ──────────▶│  FSM · BrewContext   │ ──▶ Beeper
//!                         └──────────────────────┘ ──▶ BrewingLog ──▶ LogStore
//! ```
//!
//! ## Tick order
//!
//! 1. Abort check.  A raised fail-safe latch short-circuits to `Aborted`.
//! 2. Latest temperature, listener fires (stale generations dropped),
//!    recorded temperature samples, resolved confirmations.
//! 3. FSM tick.
//! 4. Apply: relays, listener registration, confirmation request,
//!    notifications, beeps, log entries.  A terminal state closes and
//!    persists the log.
//!
//! Temperature history is taken on the monitor's read path: a sample
//! observer runs every reading through a [`TemperatureRecorder`] and posts
//! the admitted ones here, where they become `Temperature` log entries.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use log::{debug, error, info, warn};
use serde::Serialize;

use super::events::RequestId;
use super::gateway::{ConfirmationGateway, RequestStatus};
use super::ports::{LogStore, SharedNotifier};
use crate::config::SystemConfig;
use crate::drivers::beeper::Beeper;
use crate::drivers::{Actuator, Actuators};
use crate::error::{Error, Result};
use crate::fsm::context::{ActuatorCommands, BrewContext};
use crate::fsm::states::build_state_table;
use crate::fsm::Fsm;
use crate::model::{BrewingLog, BrewingState, MessageKind, Position, Recipe, State};
use crate::safety::AbortSignal;
use crate::sensors::{ListenerAction, ListenerHandle, TemperatureMonitor, TemperatureRecorder};
use crate::validate::check_recipe;

// ───────────────────────────────────────────────────────────────
// Wiring
// ───────────────────────────────────────────────────────────────

/// Everything a process talks to.  Shared with the watchdog and the
/// controller, so every field is a cheap handle.
#[derive(Clone)]
pub struct BrewingDeps {
    pub actuators: Actuators,
    pub monitor: Arc<TemperatureMonitor>,
    pub gateway: Arc<ConfirmationGateway>,
    pub notifier: SharedNotifier,
    pub logs: Arc<dyn LogStore + Send + Sync>,
    pub abort: AbortSignal,
    pub beeper: Option<Arc<Beeper>>,
}

/// Posted by a rest listener when its band is entered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureEvent {
    pub generation: u64,
    pub celsius: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrewingStatus {
    pub state: BrewingState,
    pub recipe_id: String,
    pub log_id: i64,
    pub temperature: Option<f32>,
    pub heater_on: bool,
    pub stirrer_on: bool,
    pub secs_in_state: f64,
    pub pending_request: Option<RequestId>,
}

// ───────────────────────────────────────────────────────────────
// BrewingService
// ───────────────────────────────────────────────────────────────

pub struct BrewingService {
    fsm: Fsm,
    ctx: BrewContext,
    deps: BrewingDeps,
    log: BrewingLog,
    events_tx: Sender<TemperatureEvent>,
    events_rx: Receiver<TemperatureEvent>,
    /// Relay states this process last commanded.
    applied: ActuatorCommands,
    listener: Option<(u64, ListenerHandle)>,
    samples_tx: Sender<f32>,
    samples_rx: Receiver<f32>,
    observer: Option<ListenerHandle>,
    request: Option<RequestId>,
    saved_to: Option<PathBuf>,
    finished: bool,
}

impl BrewingService {
    /// Build a process for `recipe`.  Invalid recipes are rejected.
    pub fn new(
        recipe: Recipe,
        log_id: i64,
        config: SystemConfig,
        deps: BrewingDeps,
    ) -> Result<Self> {
        check_recipe(&recipe)?;

        let mut ctx = BrewContext::new(&recipe, config);
        let mut fsm = Fsm::new(build_state_table(), State::Idle);
        fsm.start(&mut ctx);
        let (events_tx, events_rx) = mpsc::channel();
        let (samples_tx, samples_rx) = mpsc::channel();

        info!(
            "BrewingService: log {} for recipe '{}' ({} rest(s))",
            log_id,
            recipe.id,
            ctx.rests.len()
        );
        Ok(Self {
            fsm,
            ctx,
            deps,
            log: BrewingLog::new(log_id, recipe),
            events_tx,
            events_rx,
            applied: ActuatorCommands::all_off(),
            listener: None,
            samples_tx,
            samples_rx,
            observer: None,
            request: None,
            saved_to: None,
            finished: false,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Leave Idle and enter the first rest.
    pub fn start(&mut self) -> State {
        self.ctx.start_requested = true;
        self.record_temperatures();
        self.tick(0.0)
    }

    /// Run one control cycle covering `elapsed_secs` of wall time.
    pub fn tick(&mut self, elapsed_secs: f64) -> State {
        if self.finished {
            return self.state();
        }
        if self.deps.abort.is_raised() {
            let reason = self
                .deps
                .abort
                .reason()
                .unwrap_or_else(|| "fail-safe shutdown".to_string());
            self.abort_with(reason);
            return self.state();
        }

        self.ctx.temperature = self.deps.monitor.last_temperature();
        self.drain_temperature_events();
        self.drain_temperature_samples();
        self.collect_confirmation();

        self.fsm.tick(&mut self.ctx, elapsed_secs);
        self.apply();
        self.state()
    }

    /// Operator abort.  No-op once the process has ended.
    pub fn cancel(&mut self) {
        if self.state().is_terminal() {
            return;
        }
        self.abort_with("cancelled by operator".to_string());
    }

    fn abort_with(&mut self, reason: String) {
        if !self.state().is_terminal() {
            self.ctx.abort_reason = Some(reason);
            self.fsm.force_transition(State::Aborted, &mut self.ctx);
        }
        self.apply();
    }

    // ── Commands ──────────────────────────────────────────────

    /// Confirm the gated step `state`.  It must be the current step and one
    /// that is waiting for a confirmation.
    pub fn confirm_step(&mut self, state: BrewingState) -> Result<()> {
        let id = self.awaiting(state)?;
        self.deps.gateway.confirm(id)?;
        self.tick(0.0);
        Ok(())
    }

    /// Report the iodine test: `duration <= 0` is positive, otherwise keep
    /// mashing for `duration` seconds and test again.
    pub fn confirm_iodine(&mut self, duration: i64) -> Result<()> {
        let id = self.awaiting(BrewingState::new(State::IodineTest, Position::Iodine))?;
        self.deps.gateway.confirm_with(id, duration)?;
        self.tick(0.0);
        Ok(())
    }

    fn awaiting(&self, state: BrewingState) -> Result<RequestId> {
        let current = self.brewing_state();
        if state != current || !state.request_needed() {
            return Err(Error::InvalidStep(format!(
                "{:?}/{:?} is not awaiting confirmation (process is at {:?}/{:?})",
                state.state, state.position, current.state, current.position
            )));
        }
        self.request
            .ok_or_else(|| Error::InvalidStep("no confirmation request is open".to_string()))
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> State {
        self.fsm.current_state()
    }

    pub fn brewing_state(&self) -> BrewingState {
        BrewingState::new(self.fsm.current_state(), self.ctx.position)
    }

    pub fn status(&self) -> BrewingStatus {
        BrewingStatus {
            state: self.brewing_state(),
            recipe_id: self.ctx.recipe_id.clone(),
            log_id: self.log.id(),
            temperature: self.deps.monitor.last_temperature(),
            heater_on: self.deps.actuators.heater.is_switched_on(),
            stirrer_on: self.deps.actuators.stirrer.is_switched_on(),
            secs_in_state: self.ctx.secs_in_state,
            pending_request: self.request,
        }
    }

    pub fn log(&self) -> &BrewingLog {
        &self.log
    }

    /// Where the finished log was written.
    pub fn saved_path(&self) -> Option<&Path> {
        self.saved_to.as_deref()
    }

    /// The process reached a terminal state and its log was handled.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ── Inputs ────────────────────────────────────────────────

    fn drain_temperature_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match self.ctx.watch {
                Some(watch) if watch.generation == event.generation => {
                    debug!(
                        "BrewingService: {:.1}°C reached (watch {})",
                        event.celsius, event.generation
                    );
                    self.ctx.temperature_reached = true;
                }
                _ => debug!(
                    "BrewingService: dropping stale listener event (watch {})",
                    event.generation
                ),
            }
        }
    }

    fn record_temperatures(&mut self) {
        if self.observer.is_some() || self.finished {
            return;
        }
        let tx = self.samples_tx.clone();
        let mut recorder = TemperatureRecorder::from_config(&self.ctx.config);
        let handle = self.deps.monitor.observe(move |celsius| {
            if recorder.admit(celsius, Instant::now()) {
                let _ = tx.send(celsius);
            }
        });
        self.observer = Some(handle);
    }

    fn drain_temperature_samples(&mut self) {
        while let Ok(celsius) = self.samples_rx.try_recv() {
            self.ctx
                .note(MessageKind::Temperature, format!("{:.1}°C", celsius));
        }
    }

    fn collect_confirmation(&mut self) {
        let Some(id) = self.request else {
            return;
        };
        match self.deps.gateway.status(id) {
            Some(RequestStatus::Resolved { waiting_secs }) => {
                self.request = None;
                self.ctx.confirmation = Some(waiting_secs);
            }
            Some(RequestStatus::Withdrawn) | None => self.request = None,
            Some(RequestStatus::Pending) => {}
        }
    }

    // ── Outputs ───────────────────────────────────────────────

    fn apply(&mut self) {
        if let Some(reason) = self.apply_actuators() {
            if !self.state().is_terminal() {
                self.ctx.abort_reason = Some(reason);
                self.fsm.force_transition(State::Aborted, &mut self.ctx);
            }
            // Everything is commanded off now; off is never guarded.
            if let Some(reason) = self.apply_actuators() {
                warn!("BrewingService: switching off after abort: {}", reason);
            }
        }

        self.sync_watch();
        self.sync_confirmation();
        self.flush_notifications();
        self.flush_beeps();
        self.flush_journal();

        if self.state().is_terminal() && !self.finished {
            self.finish();
        }
    }

    /// Drive heater and stirrer towards the commanded state.  Returns an
    /// abort reason if a command failed or the fail-safe latch is raised.
    fn apply_actuators(&mut self) -> Option<String> {
        let wanted = self.ctx.commands;
        let abort = &self.deps.abort;
        let act = &self.deps.actuators;

        let result = drive(&act.heater, wanted.heater, &mut self.applied.heater, abort)
            .and_then(|()| drive(&act.stirrer, wanted.stirrer, &mut self.applied.stirrer, abort));
        match result {
            Err(reason) => Some(reason),
            Ok(()) if abort.is_raised() => Some(
                abort
                    .reason()
                    .unwrap_or_else(|| "fail-safe shutdown".to_string()),
            ),
            Ok(()) => None,
        }
    }

    fn sync_watch(&mut self) {
        let wanted = self.ctx.watch;
        if wanted.map(|w| w.generation) == self.listener.map(|(generation, _)| generation) {
            return;
        }
        if let Some((_, handle)) = self.listener.take() {
            self.deps.monitor.unsubscribe(handle);
        }
        let Some(watch) = wanted else {
            return;
        };
        if self.deps.abort.is_raised() {
            return;
        }

        let tx = self.events_tx.clone();
        let generation = watch.generation;
        let handle = self
            .deps
            .monitor
            .subscribe(watch.target, watch.delta, move |celsius| {
                let _ = tx.send(TemperatureEvent {
                    generation,
                    celsius,
                });
                ListenerAction::Remove
            });
        self.listener = Some((generation, handle));
    }

    fn sync_confirmation(&mut self) {
        if self.ctx.wants_confirmation {
            if self.request.is_none() && !self.deps.abort.is_raised() {
                let id = self.deps.gateway.request_confirmation(self.ctx.position);
                self.request = Some(id);
            }
        } else if let Some(id) = self.request.take() {
            self.deps.gateway.withdraw(id);
        }
    }

    fn flush_notifications(&mut self) {
        let outbox = std::mem::take(&mut self.ctx.outbox);
        if outbox.is_empty() {
            return;
        }
        let mut notifier = self
            .deps
            .notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for notification in &outbox {
            if let Err(e) = notifier.send(notification) {
                warn!(
                    "BrewingService: notification '{}' not delivered: {}",
                    notification.payload, e
                );
            }
        }
    }

    fn flush_beeps(&mut self) {
        let beeps = std::mem::take(&mut self.ctx.beeps);
        if let Some(beeper) = &self.deps.beeper {
            for pattern in beeps {
                beeper.request(pattern);
            }
        }
    }

    fn flush_journal(&mut self) {
        for (kind, text) in std::mem::take(&mut self.ctx.journal) {
            if let Err(e) = self.log.append(kind, text) {
                warn!("BrewingService: {}", e);
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        if let Some((_, handle)) = self.listener.take() {
            self.deps.monitor.unsubscribe(handle);
        }
        if let Some(handle) = self.observer.take() {
            self.deps.monitor.unsubscribe(handle);
        }
        self.drain_temperature_samples();
        self.flush_journal();
        if let Some(id) = self.request.take() {
            self.deps.gateway.withdraw(id);
        }
        if self.state() == State::Aborted {
            self.deps.gateway.withdraw_all();
            if let Some(beeper) = &self.deps.beeper {
                beeper.cancel_all();
            }
        }
        let pruned = self.deps.gateway.prune();
        if pruned > 0 {
            debug!("BrewingService: pruned {} settled request(s)", pruned);
        }

        self.log.close();
        match self.deps.logs.save_log(&self.log) {
            Ok(path) => {
                info!(
                    "BrewingService: log {} saved to {}",
                    self.log.id(),
                    path.display()
                );
                self.saved_to = Some(path);
            }
            Err(e) => error!("BrewingService: saving log {} failed: {}", self.log.id(), e),
        }
    }
}

/// Switch one actuator if its commanded state changed.  Switching on is
/// guarded by the abort latch; switching off always goes through.
fn drive(
    actuator: &Actuator,
    want: bool,
    have: &mut bool,
    abort: &AbortSignal,
) -> core::result::Result<(), String> {
    if want == *have {
        return Ok(());
    }
    let result = if want {
        actuator.switch_on_guarded(abort)
    } else {
        actuator.switch_off().map(|()| true)
    };
    match result {
        Ok(true) => {
            *have = want;
            Ok(())
        }
        Ok(false) => Err(abort
            .reason()
            .unwrap_or_else(|| "fail-safe shutdown".to_string())),
        Err(e) => {
            error!("BrewingService: {} command failed: {}", actuator.name(), e);
            Err(format!("{} failed: {}", actuator.name(), e))
        }
    }
}
