//! Decisions: the append-only record of every cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::note::{Note, NoteId};

/// Name recorded for the synthetic plan used when no plan could be obtained.
pub const NO_OP_TOOL: &str = "no_op";

/// Auto-incremented decision identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(pub i64);

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The typed result of parsing the reasoning service's reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// Name of the chosen tool
    pub tool: String,

    /// Arguments for the tool (always a JSON object)
    pub arguments: serde_json::Value,

    /// Why the service chose this action
    pub rationale: String,

    /// The service's reading of the situation, if it gave one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,

    /// Requested delay before the next cycle, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_hint_secs: Option<u64>,
}

impl ActionPlan {
    /// The plan recorded when the reasoning round produced nothing usable.
    pub fn no_op(rationale: impl Into<String>) -> Self {
        Self {
            tool: NO_OP_TOOL.to_string(),
            arguments: serde_json::json!({}),
            rationale: rationale.into(),
            analysis: None,
            interval_hint_secs: None,
        }
    }

    pub fn interval_hint(&self) -> Option<Duration> {
        self.interval_hint_secs.map(Duration::from_secs)
    }
}

/// What happened to the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The tool ran and reported success.
    Executed {
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    /// The tool ran (or was attempted) and failed.
    ToolFailed { error: String },
    /// The plan failed validation; nothing ran.
    Rejected { error: String },
    /// No usable plan was obtained from the reasoning service.
    Degraded { error: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Executed { .. })
    }

    /// Stable label used for storage and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Executed { .. } => "executed",
            Outcome::ToolFailed { .. } => "tool_failed",
            Outcome::Rejected { .. } => "rejected",
            Outcome::Degraded { .. } => "degraded",
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Executed { .. } => None,
            Outcome::ToolFailed { error }
            | Outcome::Rejected { error }
            | Outcome::Degraded { error } => Some(error),
        }
    }
}

/// A note as it was seen by a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRef {
    pub note_id: NoteId,
    pub importance: f64,
}

impl From<&Note> for ContextRef {
    fn from(note: &Note) -> Self {
        Self {
            note_id: note.id,
            importance: note.importance,
        }
    }
}

/// A decision ready to be appended. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDecision {
    pub timestamp: DateTime<Utc>,
    pub goal_id: String,
    pub context: Vec<ContextRef>,
    pub request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub plan: ActionPlan,
    pub outcome: Outcome,
    /// Errors observed along the way (failed attempts, dropped hints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of reasoning-service attempts made
    pub attempts: u32,
    /// Delay chosen before the next cycle, in seconds
    pub next_interval_secs: u64,
}

/// A persisted decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    #[serde(flatten)]
    pub record: NewDecision,
}

impl Decision {
    pub fn next_interval(&self) -> Duration {
        Duration::from_secs(self.record.next_interval_secs)
    }

    pub fn is_success(&self) -> bool {
        self.record.outcome.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_op_plan_has_empty_object_arguments() {
        let plan = ActionPlan::no_op("reasoning service unreachable");
        assert_eq!(plan.tool, NO_OP_TOOL);
        assert!(plan.arguments.as_object().unwrap().is_empty());
        assert!(plan.interval_hint().is_none());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = Outcome::Rejected {
            error: "unknown tool".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(outcome.error(), Some("unknown tool"));
        assert!(!outcome.is_success());
    }

    #[test]
    fn decision_flattens_record() {
        let decision = Decision {
            id: DecisionId(7),
            record: NewDecision {
                timestamp: Utc::now(),
                goal_id: "g".into(),
                context: vec![],
                request: "<request/>".into(),
                response: None,
                plan: ActionPlan::no_op("x"),
                outcome: Outcome::Degraded { error: "timeout".into() },
                error: Some("timeout".into()),
                attempts: 3,
                next_interval_secs: 7200,
            },
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["attempts"], 3);
        assert_eq!(decision.next_interval(), Duration::from_secs(7200));
    }
}
