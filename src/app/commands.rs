//! Inbound commands to a running brewing process.
//!
//! These represent actions requested by the outside world (the operator's
//! device, the CLI) that the [`BrewController`](super::controller::BrewController)
//! routes to the active process.

use serde::{Deserialize, Serialize};

use crate::model::BrewingState;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum BrewCommand {
    /// Confirm the gated step the process is waiting on.
    ConfirmStep { state: BrewingState },

    /// Report the iodine test result: `duration <= 0` means starch is
    /// converted; a positive value asks to keep mashing that many seconds.
    ConfirmIodine { duration: i64 },

    /// Abort the process.
    Cancel,
}
