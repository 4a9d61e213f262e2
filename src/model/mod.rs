//! Domain data: recipes, brewing logs and process state.

pub mod brew_log;
pub mod recipe;
pub mod state;

pub use brew_log::{BrewingLog, LogSummary, Message, MessageKind};
pub use recipe::{
    HopAddition, HopCookingPlan, MaltAddition, MashingPlan, Recipe, RecipeSummary, Rest,
};
pub use state::{BrewingState, Position, State};
