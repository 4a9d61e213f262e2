//! Function-pointer finite state machine engine.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                    │
//! │  ┌────────────┬───────────┬──────────┬───────────────────┐     │
//! │  │ State      │ on_enter  │ on_exit  │ on_update         │     │
//! │  ├────────────┼───────────┼──────────┼───────────────────┤     │
//! │  │ Idle       │ fn(ctx)   │ -        │ fn(ctx)->Option<> │     │
//! │  │ Mashing    │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │     │
//! │  │ IodineTest │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │     │
//! │  │ HopCooking │ fn(ctx)   │ -        │ fn(ctx)->Option<> │     │
//! │  │ Done       │ fn(ctx)   │ -        │ fn(ctx)->None     │     │
//! │  │ Aborted    │ fn(ctx)   │ -        │ fn(ctx)->None     │     │
//! │  └────────────┴───────────┴──────────┴───────────────────┘     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  Every state change appends exactly one
//! `Transition` entry to the context journal.

pub mod context;
pub mod states;

use context::BrewContext;
use log::info;

use crate::model::{MessageKind, State};

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut BrewContext);

/// Per-tick update handler.  Returns `Some(next)` to trigger a transition.
pub type StateUpdateFn = fn(&mut BrewContext) -> Option<State>;

/// One row in the state table.
pub struct StateDescriptor {
    pub id: State,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Indexed by `State as usize`.
    table: [StateDescriptor; State::COUNT],
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; State::COUNT], initial: State) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut BrewContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one tick covering `elapsed_secs` of wall time.
    pub fn tick(&mut self, ctx: &mut BrewContext, elapsed_secs: f64) {
        self.tick_count += 1;
        ctx.ticks = self.tick_count;
        ctx.tick_secs = elapsed_secs.max(0.0);
        ctx.secs_in_state += ctx.tick_secs;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Jump straight to `next` (cancel and fail-safe use this).
    pub fn force_transition(&mut self, next: State, ctx: &mut BrewContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> State {
        State::from_index(self.current)
    }

    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: State, ctx: &mut BrewContext) {
        let next_idx = next_id as usize;
        let from = self.table[self.current].name;
        let to = self.table[next_idx].name;

        info!("FSM transition: {} -> {}", from, to);
        ctx.note(MessageKind::Transition, format!("{from} -> {to}"));

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.secs_in_state = 0.0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
