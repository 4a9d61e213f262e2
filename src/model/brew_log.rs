//! The brewing log: a timestamped record of one process run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recipe::Recipe;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// The process changed top-level state.
    Transition,
    /// A mashing rest began or finished.
    Rest,
    HopAddition,
    /// Malt added during mashing, as confirmed by the operator.
    MaltAddition,
    /// Periodic kettle temperature sample.
    Temperature,
    /// An operator confirmation was received.
    Confirmation,
    Abort,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub time: DateTime<Utc>,
    pub kind: MessageKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrewingLog {
    id: i64,
    recipe: Recipe,
    messages: Vec<Message>,
    closed: bool,
}

impl BrewingLog {
    pub fn new(id: i64, recipe: Recipe) -> Self {
        Self {
            id,
            recipe,
            messages: Vec::new(),
            closed: false,
        }
    }

    /// Append a message stamped with the current time.
    pub fn append(&mut self, kind: MessageKind, text: impl Into<String>) -> Result<()> {
        if self.closed {
            return Err(Error::ValidationFailure(format!(
                "brewing log {} is closed",
                self.id
            )));
        }
        self.messages.push(Message {
            time: Utc::now(),
            kind,
            text: text.into(),
        });
        Ok(())
    }

    /// Seal the log.  Further appends fail.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.messages.iter().filter(|m| m.kind == kind).count()
    }

    pub fn was_aborted(&self) -> bool {
        self.messages.iter().any(|m| m.kind == MessageKind::Abort)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.messages.first().map(|m| m.time)
    }

    pub fn summary(&self) -> LogSummary {
        let (title, description) = if self.was_aborted() {
            (
                format!("{} (aborted)", self.recipe.name),
                format!("Aborted brewing of recipe '{}'", self.recipe.id),
            )
        } else if self.closed {
            (
                self.recipe.name.clone(),
                format!("Completed brewing of recipe '{}'", self.recipe.id),
            )
        } else {
            (
                format!("{} (in progress)", self.recipe.name),
                format!("Brewing of recipe '{}' in progress", self.recipe.id),
            )
        };
        LogSummary {
            id: self.id,
            recipe_id: self.recipe.id.clone(),
            title,
            date: self
                .messages
                .last()
                .map_or(self.recipe.date, |m| m.time),
            description,
        }
    }
}

/// Listing projection of a [`BrewingLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    pub id: i64,
    pub recipe_id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub description: String,
}
