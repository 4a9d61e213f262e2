//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers.  Handlers only read
//! and write the [`BrewContext`]; the brewing service turns their outputs
//! into relay commands, listener registrations, notifications and log
//! entries.
//!
//! ```text
//!                  [malt due]
//!                  ┌──────────┐
//!                  │          ▼
//!  IDLE ──[start]──▶ MASHING ──[last rest elapsed, malt confirmed]──▶ IODINE_TEST
//!                     │  ▲                              │   ▲
//!                     └──┘ next rest     [negative test]│   │[retest elapsed]
//!                                                       ▼   │
//!                                                  (mash on)─┘
//!                                                       │
//!                                               [positive test]
//!                                                       ▼
//!                  DONE ◀──[duration after boil reached]── HOP_COOKING
//!
//!  Any non-terminal state ──[cancel / fail-safe]──▶ ABORTED
//! ```

use log::{info, warn};

use super::context::{ActuatorCommands, BrewContext};
use super::StateDescriptor;
use crate::app::events::Notification;
use crate::drivers::beeper::BeepPattern;
use crate::model::{MessageKind, Position, State};
use crate::scheduler::{HopEvent, MaltEvent};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once per process.
pub fn build_state_table() -> [StateDescriptor; State::COUNT] {
    [
        // Index 0 — Idle
        StateDescriptor {
            id: State::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1 — Mashing
        StateDescriptor {
            id: State::Mashing,
            name: "Mashing",
            on_enter: Some(mashing_enter),
            on_exit: Some(mashing_exit),
            on_update: mashing_update,
        },
        // Index 2 — IodineTest
        StateDescriptor {
            id: State::IodineTest,
            name: "IodineTest",
            on_enter: Some(iodine_enter),
            on_exit: Some(iodine_exit),
            on_update: iodine_update,
        },
        // Index 3 — HopCooking
        StateDescriptor {
            id: State::HopCooking,
            name: "HopCooking",
            on_enter: Some(hop_enter),
            on_exit: None,
            on_update: hop_update,
        },
        // Index 4 — Done
        StateDescriptor {
            id: State::Done,
            name: "Done",
            on_enter: Some(done_enter),
            on_exit: None,
            on_update: terminal_update,
        },
        // Index 5 — Aborted
        StateDescriptor {
            id: State::Aborted,
            name: "Aborted",
            on_enter: Some(aborted_enter),
            on_exit: None,
            on_update: terminal_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut BrewContext) {
    ctx.commands = ActuatorCommands::all_off();
    ctx.position = Position::Start;
    info!("IDLE: recipe '{}' loaded", ctx.recipe_id);
}

fn idle_update(ctx: &mut BrewContext) -> Option<State> {
    if ctx.start_requested {
        return Some(State::Mashing);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  MASHING — one sub-step per rest, gated by malt confirmations
// ═══════════════════════════════════════════════════════════════════════════

fn mashing_enter(ctx: &mut BrewContext) {
    ctx.rest_index = 0;
    if ctx.rests.is_empty() {
        info!("MASHING: recipe has no rests");
        return;
    }
    begin_rest(ctx, 0);
}

fn begin_rest(ctx: &mut BrewContext, index: usize) {
    let Some(rest) = ctx.rests.get(index).copied() else {
        return;
    };
    ctx.rest_index = index;
    ctx.rest_elapsed = None;
    ctx.position = mash_position(ctx);
    ctx.commands.heater = true;
    ctx.commands.stirrer = true;
    ctx.thermostat.set_target(Some(rest.target_temperature));
    let delta = ctx.config.rest_temperature_delta_c;
    ctx.watch_temperature(rest.target_temperature, delta);

    let text = format!(
        "Rest {}/{}: {:.1}°C for {}s",
        index + 1,
        ctx.rests.len(),
        rest.target_temperature,
        rest.duration_secs
    );
    info!("MASHING: {}", text);
    ctx.note(MessageKind::Rest, text);
}

fn mashing_update(ctx: &mut BrewContext) -> Option<State> {
    let Some(rest) = ctx.current_rest().copied() else {
        return Some(State::IodineTest);
    };

    if ctx.confirmation.take().is_some() {
        confirm_malt(ctx);
    }

    ctx.rest_elapsed = match ctx.rest_elapsed {
        None if ctx.temperature_reached => {
            info!(
                "MASHING: {:.1}°C reached, rest timer started",
                rest.target_temperature
            );
            ctx.clear_watch();
            Some(0.0)
        }
        None => None,
        Some(elapsed) => Some(elapsed + ctx.tick_secs),
    };

    ctx.commands.heater = ctx.thermostat.compute(ctx.temperature);

    if let Some(clock) = ctx.mash_clock() {
        advance_malts(ctx, clock);
    }
    ctx.position = mash_position(ctx);

    #[allow(clippy::cast_precision_loss)]
    let duration = rest.duration_secs as f64;
    match ctx.rest_elapsed {
        Some(elapsed) if elapsed >= duration => {
            let next = ctx.rest_index + 1;
            if next >= ctx.rests.len() && !ctx.malt_pending.is_empty() {
                // Mashing only ends once the due malt is in.
                return None;
            }
            ctx.note(
                MessageKind::Rest,
                format!("Rest {} finished", ctx.rest_index + 1),
            );
            if next < ctx.rests.len() {
                begin_rest(ctx, next);
                None
            } else {
                Some(State::IodineTest)
            }
        }
        _ => None,
    }
}

fn mash_position(ctx: &BrewContext) -> Position {
    if ctx.malt_pending.is_empty() {
        Position::Rest(ctx.rest_index)
    } else {
        Position::MaltAddition
    }
}

fn advance_malts(ctx: &mut BrewContext, clock: u64) {
    let mut events = Vec::new();
    ctx.malts.tick(clock, &mut events);

    for event in events {
        match event {
            MaltEvent::Due { addition, .. } => {
                ctx.notify(Notification::info(format!(
                    "Add {:.0} g {}",
                    addition.amount_grams, addition.name
                )));
                ctx.beeps.push(BeepPattern::Single);
                ctx.malt_pending.push(addition);
                ctx.wants_confirmation = true;
            }
            MaltEvent::PreNotice {
                addition,
                lead_secs,
                ..
            } => {
                ctx.notify(Notification::info(format!(
                    "In {}s: add {:.0} g {}",
                    lead_secs, addition.amount_grams, addition.name
                )));
                ctx.beeps.push(BeepPattern::Double);
            }
        }
    }
}

fn confirm_malt(ctx: &mut BrewContext) {
    ctx.wants_confirmation = false;
    for addition in std::mem::take(&mut ctx.malt_pending) {
        let text = format!("Added {:.0} g {}", addition.amount_grams, addition.name);
        info!("MASHING: {}", text);
        ctx.note(MessageKind::MaltAddition, text);
    }
}

fn mashing_exit(ctx: &mut BrewContext) {
    ctx.clear_watch();
    ctx.rest_elapsed = None;
    ctx.confirmation = None;
}

// ═══════════════════════════════════════════════════════════════════════════
//  IODINE_TEST — blocks until the operator confirms
// ═══════════════════════════════════════════════════════════════════════════

fn iodine_enter(ctx: &mut BrewContext) {
    ctx.commands.stirrer = true;
    ask_for_iodine_test(ctx);
}

fn ask_for_iodine_test(ctx: &mut BrewContext) {
    ctx.position = Position::Iodine;
    ctx.wants_confirmation = true;
    ctx.beeps.push(BeepPattern::Single);
    info!("IODINE_TEST: waiting for the operator");
}

fn iodine_update(ctx: &mut BrewContext) -> Option<State> {
    ctx.commands.heater = ctx.thermostat.compute(ctx.temperature);

    if ctx.position == Position::IodineRetest {
        ctx.retest_remaining -= ctx.tick_secs;
        if ctx.retest_remaining <= 0.0 {
            ctx.retest_remaining = 0.0;
            ask_for_iodine_test(ctx);
        }
        return None;
    }

    let waiting = ctx.confirmation.take()?;
    ctx.wants_confirmation = false;
    if waiting <= 0 {
        ctx.note(MessageKind::Confirmation, "Iodine test positive");
        return Some(State::HopCooking);
    }

    #[allow(clippy::cast_precision_loss)]
    let secs = waiting as f64;
    ctx.retest_remaining = secs;
    ctx.position = Position::IodineRetest;
    ctx.note(
        MessageKind::Confirmation,
        format!("Iodine test negative, mashing {waiting}s more"),
    );
    None
}

fn iodine_exit(ctx: &mut BrewContext) {
    ctx.wants_confirmation = false;
    ctx.confirmation = None;
}

// ═══════════════════════════════════════════════════════════════════════════
//  HOP_COOKING — heat to a boil, then boil timer plus advisory additions
// ═══════════════════════════════════════════════════════════════════════════

fn hop_enter(ctx: &mut BrewContext) {
    ctx.position = Position::Boiling;
    ctx.boil_elapsed = None;
    let target = ctx.config.boil_temperature_c;
    ctx.thermostat.set_target(Some(target));
    let delta = ctx.config.boil_temperature_delta_c;
    ctx.watch_temperature(target, delta);
    ctx.commands.heater = true;
    ctx.commands.stirrer = false;
    info!(
        "HOP_COOKING: heating to {:.1}°C, then boiling for {}s with {} addition(s)",
        target,
        ctx.hop_plan.duration_secs,
        ctx.hops.len()
    );
}

fn hop_update(ctx: &mut BrewContext) -> Option<State> {
    ctx.commands.heater = ctx.thermostat.compute(ctx.temperature);

    ctx.boil_elapsed = match ctx.boil_elapsed {
        None if ctx.temperature_reached => {
            ctx.clear_watch();
            let text = format!("Boiling at {:.1}°C", ctx.config.boil_temperature_c);
            info!("HOP_COOKING: {}, boil timer started", text);
            ctx.note(MessageKind::Info, text);
            Some(0.0)
        }
        None => None,
        Some(elapsed) => Some(elapsed + ctx.tick_secs),
    };
    let elapsed = ctx.boil_elapsed?;
    advance_hops(ctx, elapsed);

    #[allow(clippy::cast_precision_loss)]
    let duration = ctx.hop_plan.duration_secs as f64;
    if elapsed >= duration {
        return Some(State::Done);
    }
    None
}

fn advance_hops(ctx: &mut BrewContext, boil_elapsed: f64) {
    let mut events = Vec::new();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let elapsed = boil_elapsed.max(0.0).floor() as u64;
    ctx.hops.tick(elapsed, &mut events);

    for event in events {
        match event {
            HopEvent::Due { addition, .. } => {
                let text = format!("Add {:.0} g {}", addition.amount_grams, addition.name);
                ctx.note(MessageKind::HopAddition, text.clone());
                ctx.notify(Notification::info(text));
            }
            HopEvent::PreNotice {
                addition,
                lead_secs,
                ..
            } => {
                ctx.notify(Notification::info(format!(
                    "In {}s: add {:.0} g {}",
                    lead_secs, addition.amount_grams, addition.name
                )));
                ctx.beeps.push(BeepPattern::Double);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DONE / ABORTED — terminal
// ═══════════════════════════════════════════════════════════════════════════

fn done_enter(ctx: &mut BrewContext) {
    ctx.stop_everything();
    ctx.position = Position::End;
    ctx.beeps.push(BeepPattern::Single);
    let text = format!("Brewing of '{}' finished", ctx.recipe_name);
    info!("DONE: {}", text);
    ctx.notify(Notification::message(text));
}

fn aborted_enter(ctx: &mut BrewContext) {
    ctx.stop_everything();
    ctx.position = Position::End;
    let reason = ctx
        .abort_reason
        .clone()
        .unwrap_or_else(|| "cancelled".to_string());
    warn!("ABORTED: {}", reason);
    ctx.note(MessageKind::Abort, format!("Aborted: {reason}"));
    ctx.notify(Notification::alarm(format!(
        "Brewing of '{}' aborted: {}",
        ctx.recipe_name, reason
    )));
}

fn terminal_update(_ctx: &mut BrewContext) -> Option<State> {
    None
}
