//! Recipes: the mashing rest plan and the hop cooking schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A complete brewing recipe.  Read-only while a process runs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// File-level identity.  The store may hand back a different id on collision.
    pub id: String,
    pub name: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub mashing: MashingPlan,
    pub hop_cooking: HopCookingPlan,
}

impl Recipe {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            date: Utc::now(),
            mashing: MashingPlan::default(),
            hop_cooking: HopCookingPlan::default(),
        }
    }

    pub fn summary(&self) -> RecipeSummary {
        RecipeSummary {
            id: self.id.clone(),
            title: self.name.clone(),
            date: self.date,
            description: self.description.clone(),
        }
    }
}

/// Listing projection of a [`Recipe`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub description: String,
}

// ───────────────────────────────────────────────────────────────
// Mashing
// ───────────────────────────────────────────────────────────────

/// A timed hold at a target temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub target_temperature: f32,
    pub duration_secs: u64,
    /// Offset of this rest from the start of mashing.
    pub start_offset_secs: u64,
}

impl Rest {
    pub fn end_secs(&self) -> u64 {
        self.start_offset_secs.saturating_add(self.duration_secs)
    }

    /// Whether the half-open ranges `[start, end)` of both rests intersect.
    /// An empty range intersects nothing.
    pub fn overlaps(&self, other: &Rest) -> bool {
        if self.duration_secs == 0 || other.duration_secs == 0 {
            return false;
        }
        self.start_offset_secs < other.end_secs() && other.start_offset_secs < self.end_secs()
    }
}

/// Malt the brewer adds during mashing.  Each one needs a confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaltAddition {
    pub name: String,
    pub amount_grams: f32,
    /// Seconds into mashing, on the same clock as the rest offsets.
    pub input_time_secs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MashingPlan {
    pub rests: Vec<Rest>,
    #[serde(default)]
    pub malt_additions: Vec<MaltAddition>,
}

impl MashingPlan {
    /// Build back-to-back rests from `(temperature, seconds)` pairs.
    pub fn sequential(steps: &[(f32, u64)]) -> Self {
        let mut offset = 0;
        let rests = steps
            .iter()
            .map(|&(target_temperature, duration_secs)| {
                let rest = Rest {
                    target_temperature,
                    duration_secs,
                    start_offset_secs: offset,
                };
                offset += duration_secs;
                rest
            })
            .collect();
        Self {
            rests,
            malt_additions: Vec::new(),
        }
    }

    /// End of the last rest; the mashing clock never runs past it.
    pub fn end_secs(&self) -> u64 {
        self.rests.iter().map(Rest::end_secs).max().unwrap_or(0)
    }

    /// Rests in the order they run.
    pub fn ordered_rests(&self) -> Vec<Rest> {
        let mut rests = self.rests.clone();
        rests.sort_by_key(|r| r.start_offset_secs);
        rests
    }

    /// Malt additions sorted by input time.
    pub fn ordered_malt_additions(&self) -> Vec<MaltAddition> {
        let mut additions = self.malt_additions.clone();
        additions.sort_by_key(|a| a.input_time_secs);
        additions
    }
}

// ───────────────────────────────────────────────────────────────
// Hop cooking
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopAddition {
    pub name: String,
    pub amount_grams: f32,
    /// Seconds after the boil timer starts.
    pub input_time_secs: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HopCookingPlan {
    pub duration_secs: u64,
    pub additions: Vec<HopAddition>,
}

impl HopCookingPlan {
    /// Additions sorted by input time.
    pub fn ordered_additions(&self) -> Vec<HopAddition> {
        let mut additions = self.additions.clone();
        additions.sort_by_key(|a| a.input_time_secs);
        additions
    }
}
