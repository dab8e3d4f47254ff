//! Domain event system: lets monitors follow the decision cycle without
//! being wired into it.
//!
//! Events are published as the engine moves through a cycle. Anything
//! interested (a status line, a metrics exporter) subscribes and filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// States of a single decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    Idle,
    Gathering,
    Requesting,
    Validating,
    Dispatching,
    Recording,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleStage::Idle => "idle",
            CycleStage::Gathering => "gathering",
            CycleStage::Requesting => "requesting",
            CycleStage::Validating => "validating",
            CycleStage::Dispatching => "dispatching",
            CycleStage::Recording => "recording",
        };
        f.write_str(s)
    }
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A new cycle began
    CycleStarted {
        cycle: u64,
        timestamp: DateTime<Utc>,
    },

    /// The engine moved to a new stage
    StageEntered {
        cycle: u64,
        stage: CycleStage,
        timestamp: DateTime<Utc>,
    },

    /// One reasoning-service attempt failed (transport or parse)
    ReasonerAttemptFailed {
        cycle: u64,
        attempt: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolInvoked {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The cycle's decision was persisted
    DecisionRecorded {
        decision_id: i64,
        outcome: String,
        next_interval_secs: u64,
        timestamp: DateTime<Utc>,
    },

    /// The cycle could not be recorded (storage failure)
    CycleAborted {
        cycle: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
