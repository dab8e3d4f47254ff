//! The standing objective the agent pursues for the lifetime of a run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An immutable description of what the agent is working towards.
///
/// Target metrics use a `BTreeMap` so serialization order is stable,
/// which the protocol layer relies on for byte-identical requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Unique goal identifier
    pub id: String,

    /// Free-text description of the objective
    pub description: String,

    /// Measurable targets (e.g. `"weekly_mileage": 50`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub target_metrics: BTreeMap<String, serde_json::Value>,

    /// Qualitative success criteria
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_criteria: Vec<String>,

    /// Optional deadline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    /// When the goal was set up
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// Create a goal with a fresh id and the current timestamp.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            target_metrics: BTreeMap::new(),
            success_criteria: Vec::new(),
            due_date: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.target_metrics.insert(name.into(), value);
        self
    }

    pub fn with_criterion(mut self, criterion: impl Into<String>) -> Self {
        self.success_criteria.push(criterion.into());
        self
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_metrics_in_key_order() {
        let goal = Goal::new("Run a sub-3h marathon")
            .with_metric("weekly_mileage", serde_json::json!(50))
            .with_metric("long_run_km", serde_json::json!(32));
        let keys: Vec<_> = goal.target_metrics.keys().cloned().collect();
        assert_eq!(keys, vec!["long_run_km", "weekly_mileage"]);
    }

    #[test]
    fn goal_serialization_skips_empty_fields() {
        let goal = Goal::new("Stay hydrated").with_id("g1");
        let json = serde_json::to_string(&goal).unwrap();
        assert!(json.contains("\"id\":\"g1\""));
        assert!(!json.contains("target_metrics"));
        assert!(!json.contains("due_date"));
    }
}
