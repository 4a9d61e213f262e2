//! Shared mutable context threaded through every FSM handler.
//!
//! `BrewContext` is the blackboard the state handlers read from and write
//! to.  The brewing service fills the inputs before each tick (temperature,
//! listener fires, confirmations, start/abort) and applies the outputs after
//! it (actuator commands, the temperature watch, notifications, beeps and
//! log entries).  Handlers never touch hardware or stores directly.

use crate::app::events::Notification;
use crate::config::SystemConfig;
use crate::control::Thermostat;
use crate::drivers::beeper::BeepPattern;
use crate::model::{HopCookingPlan, MaltAddition, MessageKind, Position, Recipe, Rest};
use crate::scheduler::{HopSchedule, MaltSchedule};

// ---------------------------------------------------------------------------
// Actuator commands (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorCommands {
    pub heater: bool,
    pub stirrer: bool,
}

impl ActuatorCommands {
    /// Heater and stirrer off.  The signal relay belongs to the beeper.
    pub fn all_off() -> Self {
        Self::default()
    }
}

/// Band the process wants the monitor to watch.  A new generation is
/// issued for every watch, so late fires from an old band are recognisable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureWatch {
    pub generation: u64,
    pub target: f32,
    pub delta: f32,
}

// ---------------------------------------------------------------------------
// BrewContext
// ---------------------------------------------------------------------------

pub struct BrewContext {
    // -- Timing --
    /// Seconds covered by the current tick.
    pub tick_secs: f64,
    /// Seconds since the current state was entered.
    pub secs_in_state: f64,
    pub ticks: u64,

    // -- Recipe (read-only) --
    pub recipe_id: String,
    pub recipe_name: String,
    /// Rests in running order.
    pub rests: Vec<Rest>,
    pub hop_plan: HopCookingPlan,

    // -- Progress --
    pub position: Position,
    pub rest_index: usize,
    /// Seconds into the current rest; `None` until its temperature is reached.
    pub rest_elapsed: Option<f64>,
    pub malts: MaltSchedule,
    /// Malt additions that came due and wait for the operator.
    pub malt_pending: Vec<MaltAddition>,
    /// Seconds into the boil; `None` until the boil temperature is reached.
    pub boil_elapsed: Option<f64>,
    pub hops: HopSchedule,
    /// Seconds left before a negative iodine test is repeated.
    pub retest_remaining: f64,

    // -- Inputs --
    /// Latest thermometer sample.
    pub temperature: Option<f32>,
    /// The active watch's listener has fired.
    pub temperature_reached: bool,
    /// Resolved confirmation with its waiting duration in seconds.
    pub confirmation: Option<i64>,
    pub start_requested: bool,
    pub abort_reason: Option<String>,

    // -- Outputs --
    pub commands: ActuatorCommands,
    pub thermostat: Thermostat,
    pub watch: Option<TemperatureWatch>,
    pub wants_confirmation: bool,
    pub beeps: Vec<BeepPattern>,
    pub outbox: Vec<Notification>,
    pub journal: Vec<(MessageKind, String)>,

    // -- Configuration --
    pub config: SystemConfig,

    next_generation: u64,
}

impl BrewContext {
    pub fn new(recipe: &Recipe, config: SystemConfig) -> Self {
        let prenotify = u64::from(config.hop_prenotification_secs);
        Self {
            tick_secs: 0.0,
            secs_in_state: 0.0,
            ticks: 0,

            recipe_id: recipe.id.clone(),
            recipe_name: recipe.name.clone(),
            rests: recipe.mashing.ordered_rests(),
            hop_plan: recipe.hop_cooking.clone(),

            position: Position::Start,
            rest_index: 0,
            rest_elapsed: None,
            malts: MaltSchedule::new(recipe.mashing.ordered_malt_additions(), prenotify),
            malt_pending: Vec::new(),
            boil_elapsed: None,
            hops: HopSchedule::new(recipe.hop_cooking.ordered_additions(), prenotify),
            retest_remaining: 0.0,

            temperature: None,
            temperature_reached: false,
            confirmation: None,
            start_requested: false,
            abort_reason: None,

            commands: ActuatorCommands::all_off(),
            thermostat: Thermostat::new(config.heatup_delta_c),
            watch: None,
            wants_confirmation: false,
            beeps: Vec::new(),
            outbox: Vec::new(),
            journal: Vec::new(),

            config,
            next_generation: 0,
        }
    }

    /// Ask for a fresh listener on `target ± delta`.
    pub fn watch_temperature(&mut self, target: f32, delta: f32) {
        self.next_generation += 1;
        self.watch = Some(TemperatureWatch {
            generation: self.next_generation,
            target,
            delta,
        });
        self.temperature_reached = false;
    }

    pub fn clear_watch(&mut self) {
        self.watch = None;
        self.temperature_reached = false;
    }

    /// Queue a brewing log entry.
    pub fn note(&mut self, kind: MessageKind, text: impl Into<String>) {
        self.journal.push((kind, text.into()));
    }

    pub fn notify(&mut self, notification: Notification) {
        self.outbox.push(notification);
    }

    pub fn current_rest(&self) -> Option<&Rest> {
        self.rests.get(self.rest_index)
    }

    /// Seconds on the mashing clock: the current rest's offset plus its
    /// elapsed time.  `None` while the rest is still heating up.
    pub fn mash_clock(&self) -> Option<u64> {
        let rest = self.current_rest()?;
        let elapsed = self.rest_elapsed?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let secs = elapsed.max(0.0).floor() as u64;
        Some(rest.start_offset_secs.saturating_add(secs))
    }

    /// Heater, stirrer, thermostat and watch all off.
    pub fn stop_everything(&mut self) {
        self.commands = ActuatorCommands::all_off();
        self.thermostat.reset();
        self.clear_watch();
        self.wants_confirmation = false;
    }
}
