//! Structural recipe validation.
//!
//! Checks run in a fixed order (id, rests, malt additions, hop plan) and the first
//! violation found is reported.  A recipe that passes can be handed to a
//! brewing process.

use crate::error::{Error, Result};
use crate::model::Recipe;

/// Returns a description of the first rule the recipe breaks, or `None`.
pub fn validate_recipe(recipe: &Recipe) -> Option<String> {
    if recipe.id.trim().is_empty() {
        return Some("recipe id must not be empty".to_string());
    }

    let rests = &recipe.mashing.rests;
    for (i, a) in rests.iter().enumerate() {
        for (j, b) in rests.iter().enumerate().skip(i + 1) {
            if a.overlaps(b) {
                return Some(format!(
                    "mashing rest {} [{}s, {}s) overlaps rest {} [{}s, {}s)",
                    i + 1,
                    a.start_offset_secs,
                    a.end_secs(),
                    j + 1,
                    b.start_offset_secs,
                    b.end_secs()
                ));
            }
        }
    }

    let mash_end = recipe.mashing.end_secs();
    for addition in &recipe.mashing.malt_additions {
        if recipe.mashing.rests.is_empty() {
            return Some(format!(
                "malt addition '{}' needs at least one mashing rest",
                addition.name
            ));
        }
        let t = addition.input_time_secs;
        if t < 0 || t as u64 > mash_end {
            return Some(format!(
                "malt addition '{}' at {}s lies outside the mashing time [0s, {}s]",
                addition.name, t, mash_end
            ));
        }
    }

    let duration = recipe.hop_cooking.duration_secs;
    for addition in &recipe.hop_cooking.additions {
        let t = addition.input_time_secs;
        if t < 0 || t as u64 > duration {
            return Some(format!(
                "hop addition '{}' at {}s lies outside the cooking time [0s, {}s]",
                addition.name, t, duration
            ));
        }
    }

    None
}

/// [`validate_recipe`] as a typed result.
pub fn check_recipe(recipe: &Recipe) -> Result<()> {
    match validate_recipe(recipe) {
        Some(msg) => Err(Error::ValidationFailure(msg)),
        None => Ok(()),
    }
}
