//! Importance scoring.
//!
//! `importance = w_r * recency + w_c * category_weight + w_n * novelty`
//!
//! - **recency** halves every `half_life` (exponential decay)
//! - **category weight** comes from a configured table
//! - **novelty** is one minus the highest word-set Jaccard similarity
//!   against the last `novelty_window` notes of the same category
//!
//! Everything here is a pure function of its arguments: no clock reads,
//! no hashing order, so identical inputs always produce identical scores.

use chrono::{DateTime, Utc};
use goalward_core::note::{NewNote, Note};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Lower bound of the importance range.
pub const MIN_IMPORTANCE: f64 = 0.0;
/// Upper bound of the importance range.
pub const MAX_IMPORTANCE: f64 = 1.0;

/// Tunables for the scoring routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub recency_weight: f64,
    pub category_weight: f64,
    pub novelty_weight: f64,

    /// Hours after which the recency component has halved
    pub half_life_hours: f64,

    /// How many recent same-category notes novelty is measured against
    pub novelty_window: usize,

    /// Per-category weights in `[0, 1]`
    pub category_weights: BTreeMap<String, f64>,

    /// Weight for categories missing from the table
    pub default_category_weight: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        let category_weights = [
            ("goal", 1.0),
            ("progress", 0.8),
            ("observation", 0.6),
            ("plan", 0.6),
            ("general", 0.5),
            ("engine", 0.3),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            recency_weight: 0.4,
            category_weight: 0.3,
            novelty_weight: 0.3,
            half_life_hours: 24.0,
            novelty_window: 10,
            category_weights,
            default_category_weight: 0.5,
        }
    }
}

/// The write-time components of a note's score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreComponents {
    pub category_weight: f64,
    pub novelty: f64,
    pub importance: f64,
}

impl ScoringPolicy {
    /// Weight assigned to `category`, clamped to `[0, 1]`.
    pub fn weight_for(&self, category: &str) -> f64 {
        self.category_weights
            .get(category)
            .copied()
            .unwrap_or(self.default_category_weight)
            .clamp(0.0, 1.0)
    }

    /// `0.5^(age / half_life)`; future timestamps count as age zero.
    pub fn recency(&self, observed: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_hours = ((now - observed).num_milliseconds().max(0) as f64) / 3_600_000.0;
        if self.half_life_hours <= 0.0 {
            return if age_hours == 0.0 { 1.0 } else { 0.0 };
        }
        0.5_f64.powf(age_hours / self.half_life_hours)
    }

    /// `1 - max Jaccard` against `history`; 1.0 with no history.
    pub fn novelty<'a>(&self, content: &str, history: impl IntoIterator<Item = &'a str>) -> f64 {
        let words = word_set(content);
        let max_similarity = history
            .into_iter()
            .take(self.novelty_window)
            .map(|previous| jaccard(&words, &word_set(previous)))
            .fold(0.0_f64, f64::max);
        (1.0 - max_similarity).clamp(0.0, 1.0)
    }

    /// Combine the components into an importance score in `[0, 1]`.
    pub fn importance(
        &self,
        category_weight: f64,
        novelty: f64,
        observed: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> f64 {
        let total = self.recency_weight + self.category_weight + self.novelty_weight;
        if total <= 0.0 {
            return MIN_IMPORTANCE;
        }
        let raw = self.recency_weight * self.recency(observed, now)
            + self.category_weight * category_weight
            + self.novelty_weight * novelty;
        (raw / total).clamp(MIN_IMPORTANCE, MAX_IMPORTANCE)
    }

    /// Score a note on the way in. `history` is the same-category notes,
    /// newest first; recency is measured at the note's own timestamp.
    pub fn score_new<'a>(
        &self,
        note: &NewNote,
        history: impl IntoIterator<Item = &'a str>,
    ) -> ScoreComponents {
        let category_weight = self.weight_for(&note.category);
        let novelty = self.novelty(&note.content, history);
        let importance = self.importance(category_weight, novelty, note.timestamp, note.timestamp);
        ScoreComponents {
            category_weight,
            novelty,
            importance,
        }
    }

    /// Recompute a stored note's importance relative to `now`.
    pub fn rescore(&self, note: &Note, now: DateTime<Utc>) -> f64 {
        self.importance(note.category_weight, note.novelty, note.timestamp, now)
    }
}

/// Context ordering: importance descending, then newest, then highest id.
pub fn rank_order(a: &Note, b: &Note) -> Ordering {
    b.importance
        .partial_cmp(&a.importance)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.timestamp.cmp(&a.timestamp))
        .then_with(|| b.id.cmp(&a.id))
}

fn word_set(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}
