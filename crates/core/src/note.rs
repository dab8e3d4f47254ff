//! Notes: timestamped facts and measurements held by the memory store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Source label used for notes written by the decision engine itself.
pub const ENGINE_SOURCE: &str = "engine";

/// Category used when a writer does not supply one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Auto-incremented note identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,

    /// When the fact was observed
    pub timestamp: DateTime<Utc>,

    /// Free-form category (e.g. "progress", "health")
    pub category: String,

    /// The fact itself
    pub content: String,

    /// Tool name or [`ENGINE_SOURCE`]
    pub source: String,

    /// Ranking score in `[0.0, 1.0]`; only the scoring routine writes it
    pub importance: f64,

    /// Category weight captured at write time
    pub category_weight: f64,

    /// Novelty against recent notes in the same category, captured at write time
    pub novelty: f64,
}

/// A request to append a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNote {
    pub category: String,
    pub content: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl NewNote {
    pub fn new(
        category: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let category = category.into();
        Self {
            category: if category.trim().is_empty() {
                DEFAULT_CATEGORY.to_string()
            } else {
                category
            },
            content: content.into(),
            source: source.into(),
            timestamp: Utc::now(),
        }
    }

    /// Override the observation time (replays and deterministic tests).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
