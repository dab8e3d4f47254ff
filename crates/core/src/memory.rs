//! Memory store trait: the durable log of notes and decisions.
//!
//! The memory store is the agent's only long-lived state. It supports:
//! - Appending notes (scored on write) and decisions (immutable)
//! - Importance-ranked context retrieval within a time window
//! - On-demand period summaries read from a consistent snapshot

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::decision::{Decision, DecisionId, NewDecision};
use crate::error::StorageError;
use crate::note::{NewNote, Note, NoteId};

/// An inclusive time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { since, until }
    }

    /// The window of length `span` ending at `until`. Spans reaching past
    /// the representable range start at the earliest instant.
    pub fn ending_at(until: DateTime<Utc>, span: Duration) -> Self {
        Self {
            since: until
                .checked_sub_signed(span)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            until,
        }
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.since && *at <= self.until
    }

    /// The window of equal length immediately before this one.
    pub fn previous(&self) -> Self {
        let span = self.until - self.since;
        Self {
            since: self
                .since
                .checked_sub_signed(span)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            until: self.since,
        }
    }
}

/// A request for ranked context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextQuery {
    /// Maximum number of notes to return
    pub limit: usize,

    /// Only notes observed inside this window
    pub window: TimeWindow,

    /// Restrict to these categories (None = all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

impl ContextQuery {
    pub fn new(limit: usize, window: TimeWindow) -> Self {
        Self {
            limit,
            window,
            categories: None,
        }
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn matches(&self, note: &Note) -> bool {
        self.window.contains(&note.timestamp)
            && self
                .categories
                .as_ref()
                .is_none_or(|cats| cats.iter().any(|c| c == &note.category))
    }
}

/// Summary granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl SummaryPeriod {
    pub fn span(&self) -> Duration {
        match self {
            SummaryPeriod::Daily => Duration::days(1),
            SummaryPeriod::Weekly => Duration::days(7),
            SummaryPeriod::Monthly => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryPeriod::Daily => "daily",
            SummaryPeriod::Weekly => "weekly",
            SummaryPeriod::Monthly => "monthly",
        }
    }
}

impl fmt::Display for SummaryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(SummaryPeriod::Daily),
            "weekly" | "week" => Ok(SummaryPeriod::Weekly),
            "monthly" | "month" => Ok(SummaryPeriod::Monthly),
            other => Err(format!("unknown summary period '{other}'")),
        }
    }
}

/// A top-importance note surfaced by a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub note_id: NoteId,
    pub category: String,
    pub content: String,
    pub importance: f64,
}

/// Change against the previous period of the same length.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendDeltas {
    pub notes: i64,
    pub decisions: i64,
    pub failures: i64,
    /// Difference in success rate (0.0–1.0 scale); 0 when either period is empty
    pub success_rate: f64,
}

/// Aggregated view of one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub period: SummaryPeriod,
    pub window: TimeWindow,
    pub note_count: usize,
    pub notes_by_category: BTreeMap<String, usize>,
    pub decision_count: usize,
    pub decisions_by_outcome: BTreeMap<String, usize>,
    pub failure_count: usize,
    /// Highest decision id visible when the snapshot was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_decision_id: Option<DecisionId>,
    pub trend: TrendDeltas,
    pub highlights: Vec<Highlight>,
}

/// The core MemoryStore trait.
///
/// Implementations: SQLite (persistent) and in-memory (tests, dry runs).
/// Every write is atomic per record; readers never see half a record.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append a note, computing its importance score on the way in.
    async fn record_note(&self, note: NewNote) -> Result<NoteId, StorageError>;

    /// Append an immutable decision.
    async fn record_decision(&self, decision: NewDecision) -> Result<DecisionId, StorageError>;

    /// Notes in the window, by descending importance, then newest first.
    async fn retrieve_context(&self, query: ContextQuery) -> Result<Vec<Note>, StorageError>;

    /// Aggregate the period ending at `now` from a consistent snapshot.
    async fn summarize(
        &self,
        period: SummaryPeriod,
        now: DateTime<Utc>,
    ) -> Result<Summary, StorageError>;

    /// Recompute every note's importance relative to `now`. Returns the
    /// number of notes rescored.
    async fn rescore(&self, now: DateTime<Utc>) -> Result<usize, StorageError>;

    async fn get_note(&self, id: NoteId) -> Result<Option<Note>, StorageError>;

    /// The most recently recorded decision, if any.
    async fn last_decision(&self) -> Result<Option<Decision>, StorageError>;

    /// Up to `limit` decisions, newest first.
    async fn recent_decisions(&self, limit: usize) -> Result<Vec<Decision>, StorageError>;

    async fn note_count(&self) -> Result<usize, StorageError>;

    async fn decision_count(&self) -> Result<usize, StorageError>;

    /// Archive a computed summary. Summaries are never read back by
    /// `summarize`; this is a history for external consumers.
    async fn record_summary(&self, summary: &Summary) -> Result<i64, StorageError>;
}
