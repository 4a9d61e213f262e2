//! Where a brewing process currently is.

use serde::{Deserialize, Serialize};

/// Top-level process states.
/// Must stay in sync with the table built in [`crate::fsm::states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum State {
    Idle = 0,
    Mashing = 1,
    IodineTest = 2,
    HopCooking = 3,
    Done = 4,
    Aborted = 5,
}

impl State {
    /// Total number of states — used to size the table array.
    pub const COUNT: usize = 6;

    /// Convert a table index back to `State`.  Out-of-range indices are a
    /// programming error; release builds fall back to `Aborted`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Mashing,
            2 => Self::IodineTest,
            3 => Self::HopCooking,
            4 => Self::Done,
            5 => Self::Aborted,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Aborted
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

/// Sub-step inside a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Start,
    /// Index into the rests in running order.
    Rest(usize),
    /// Malt additions are due and wait for the operator.
    MaltAddition,
    /// Waiting for the operator's iodine test result.
    Iodine,
    /// Negative iodine test: mashing continues before the next test.
    IodineRetest,
    Boiling,
    End,
}

/// State plus position; the payload of a confirm-step command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrewingState {
    pub state: State,
    pub position: Position,
}

impl BrewingState {
    pub fn new(state: State, position: Position) -> Self {
        Self { state, position }
    }

    /// True iff the process cannot advance without an external confirmation.
    pub fn request_needed(&self) -> bool {
        matches!(self.position, Position::Iodine | Position::MaltAddition)
    }
}
