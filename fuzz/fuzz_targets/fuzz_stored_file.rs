//! Fuzz target: stored recipe and brewing log files
//!
//! Feeds arbitrary bytes to the two-line file decoder and verifies:
//! - No panics on malformed headers or entities
//! - A decoded recipe can be validated and re-encoded
//!
//! cargo fuzz run fuzz_stored_file

#![no_main]

use brewcore::adapters::file_store::{decode_entity, decode_header};
use brewcore::model::{BrewingLog, LogSummary, Recipe, RecipeSummary};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = core::str::from_utf8(data) else {
        return;
    };

    let _ = decode_header::<RecipeSummary>(raw);
    let _ = decode_header::<LogSummary>(raw);
    let _ = decode_entity::<BrewingLog>(raw);

    if let Ok(recipe) = decode_entity::<Recipe>(raw) {
        let _ = brewcore::validate::validate_recipe(&recipe);
        let _ = recipe.mashing.ordered_rests();
        let _ = recipe.hop_cooking.ordered_additions();
        let _ = serde_json::to_string(&recipe);
    }
});
