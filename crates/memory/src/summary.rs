//! Period summaries, shared by every backend.
//!
//! Backends take a snapshot of the notes and decisions covering the
//! current and previous period, then hand it to [`compute`].

use chrono::{DateTime, Utc};
use goalward_core::decision::Decision;
use goalward_core::memory::{Highlight, Summary, SummaryPeriod, TimeWindow, TrendDeltas};
use goalward_core::note::Note;
use std::collections::BTreeMap;

use crate::scoring::rank_order;

/// Number of top-importance notes included in a summary.
pub const HIGHLIGHT_COUNT: usize = 5;

/// The window a summary of `period` ending at `now` covers, plus the
/// earliest timestamp a backend needs to load (start of the previous period).
pub fn windows(period: SummaryPeriod, now: DateTime<Utc>) -> (TimeWindow, TimeWindow) {
    let current = TimeWindow::ending_at(now, period.span());
    (current, current.previous())
}

/// Aggregate a snapshot. Extra records outside both windows are ignored.
pub fn compute(
    period: SummaryPeriod,
    now: DateTime<Utc>,
    notes: &[Note],
    decisions: &[Decision],
) -> Summary {
    let (current, previous) = windows(period, now);
    // The previous window excludes its upper bound so nothing is counted twice
    let in_previous = |at: &DateTime<Utc>| *at >= previous.since && *at < previous.until;

    let mut current_notes: Vec<&Note> = notes
        .iter()
        .filter(|n| current.contains(&n.timestamp))
        .collect();
    let previous_note_count = notes.iter().filter(|n| in_previous(&n.timestamp)).count();

    let mut notes_by_category = BTreeMap::new();
    for note in &current_notes {
        *notes_by_category.entry(note.category.clone()).or_insert(0) += 1;
    }

    let current_decisions: Vec<&Decision> = decisions
        .iter()
        .filter(|d| current.contains(&d.record.timestamp))
        .collect();
    let previous_decisions: Vec<&Decision> = decisions
        .iter()
        .filter(|d| in_previous(&d.record.timestamp))
        .collect();

    let mut decisions_by_outcome = BTreeMap::new();
    for decision in &current_decisions {
        *decisions_by_outcome
            .entry(decision.record.outcome.label().to_string())
            .or_insert(0) += 1;
    }

    let failures = |ds: &[&Decision]| ds.iter().filter(|d| !d.is_success()).count();
    let success_rate = |ds: &[&Decision]| {
        if ds.is_empty() {
            None
        } else {
            Some((ds.len() - failures(ds)) as f64 / ds.len() as f64)
        }
    };

    let failure_count = failures(&current_decisions);
    let trend = TrendDeltas {
        notes: current_notes.len() as i64 - previous_note_count as i64,
        decisions: current_decisions.len() as i64 - previous_decisions.len() as i64,
        failures: failure_count as i64 - failures(&previous_decisions) as i64,
        success_rate: match (
            success_rate(&current_decisions),
            success_rate(&previous_decisions),
        ) {
            (Some(now_rate), Some(then_rate)) => now_rate - then_rate,
            _ => 0.0,
        },
    };

    current_notes.sort_by(|a, b| rank_order(a, b));
    let highlights = current_notes
        .iter()
        .take(HIGHLIGHT_COUNT)
        .map(|n| Highlight {
            note_id: n.id,
            category: n.category.clone(),
            content: n.content.clone(),
            importance: n.importance,
        })
        .collect();

    Summary {
        period,
        window: current,
        note_count: current_notes.len(),
        notes_by_category,
        decision_count: current_decisions.len(),
        decisions_by_outcome,
        failure_count,
        last_decision_id: decisions.iter().map(|d| d.id).max(),
        trend,
        highlights,
    }
}
