//! The decision engine: one goal-directed cycle at a time.
//!
//! `Idle → Gathering → Requesting → Validating → Dispatching → Recording → Idle`
//!
//! Every cycle ends in exactly one recorded Decision unless the store
//! itself fails. Reasoning-service trouble degrades the cycle to a no-op,
//! a bad plan is rejected before any tool runs, and a failing tool is
//! captured as data.

use chrono::Utc;
use goalward_core::decision::{ActionPlan, ContextRef, DecisionId, NewDecision, Outcome};
use goalward_core::error::{StorageError, TransportError};
use goalward_core::event::{CycleStage, DomainEvent, EventBus};
use goalward_core::goal::Goal;
use goalward_core::memory::{ContextQuery, MemoryStore, TimeWindow};
use goalward_core::note::{ENGINE_SOURCE, NewNote};
use goalward_core::reasoner::{Reasoner, RequestPayload};
use goalward_core::tool::ToolRegistry;
use goalward_protocol::{build_request, parse_response};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

/// Category of the notes the engine writes about its own failures.
pub const ENGINE_CATEGORY: &str = "engine";

/// Tunables for a cycle.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Maximum notes handed to the reasoning service
    pub context_limit: usize,

    /// How far back context is drawn from
    pub context_window: chrono::Duration,

    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            context_limit: 20,
            context_window: chrono::Duration::days(7),
            retry: RetryPolicy::default(),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub decision_id: DecisionId,
    pub plan: ActionPlan,
    pub outcome: Outcome,
    pub attempts: u32,
    pub context_size: usize,
    pub next_interval: Duration,
}

/// Result of the Requesting stage.
struct Exchange {
    plan: Option<ActionPlan>,
    response: Option<String>,
    attempts: u32,
    last_error: Option<String>,
}

/// Runs decision cycles for a single goal.
pub struct DecisionEngine {
    goal: Goal,
    store: Arc<dyn MemoryStore>,
    registry: Arc<ToolRegistry>,
    reasoner: Arc<dyn Reasoner>,
    settings: EngineSettings,
    events: Arc<EventBus>,
    // Held for a whole cycle; also counts cycles
    cycle_guard: Mutex<u64>,
}

impl DecisionEngine {
    pub fn new(
        goal: Goal,
        store: Arc<dyn MemoryStore>,
        registry: Arc<ToolRegistry>,
        reasoner: Arc<dyn Reasoner>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            goal,
            store,
            registry,
            reasoner,
            settings,
            events: Arc::new(EventBus::default()),
            cycle_guard: Mutex::new(0),
        }
    }

    /// Publish cycle events on a shared bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Run one cycle. `next_interval` picks the delay recorded with the
    /// decision, given the final plan and outcome.
    ///
    /// Only a [`StorageError`] escapes; it means nothing was recorded.
    pub async fn run_cycle<F>(&self, next_interval: F) -> Result<CycleReport, StorageError>
    where
        F: FnOnce(&ActionPlan, &Outcome) -> Duration + Send,
    {
        let mut counter = self.cycle_guard.lock().await;
        *counter += 1;
        let cycle = *counter;

        info!(cycle, goal = %self.goal.id, "Cycle started");
        self.events.publish(DomainEvent::CycleStarted {
            cycle,
            timestamp: Utc::now(),
        });

        let result = self.cycle(cycle, next_interval).await;
        if let Err(e) = &result {
            warn!(cycle, error = %e, "Cycle aborted, nothing recorded");
            self.events.publish(DomainEvent::CycleAborted {
                cycle,
                error: e.to_string(),
                timestamp: Utc::now(),
            });
        }
        self.enter(cycle, CycleStage::Idle);
        result
    }

    async fn cycle<F>(&self, cycle: u64, next_interval: F) -> Result<CycleReport, StorageError>
    where
        F: FnOnce(&ActionPlan, &Outcome) -> Duration + Send,
    {
        // ── Gathering ──
        self.enter(cycle, CycleStage::Gathering);
        let now = Utc::now();
        let rescored = self.store.rescore(now).await?;
        let query = ContextQuery::new(
            self.settings.context_limit,
            TimeWindow::ending_at(now, self.settings.context_window),
        );
        let context = self.store.retrieve_context(query).await?;
        debug!(cycle, rescored, context = context.len(), "Context gathered");

        // ── Requesting ──
        self.enter(cycle, CycleStage::Requesting);
        let request = build_request(&self.goal, &context, &self.registry.catalog());
        debug!(cycle, bytes = request.len(), "Request built");
        let exchange = self.request_plan(cycle, &request).await;

        let (plan, outcome) = match exchange.plan {
            None => {
                let error = exchange
                    .last_error
                    .unwrap_or_else(|| "no usable reply".to_string());
                warn!(cycle, attempts = exchange.attempts, error = %error, "Reasoning exhausted, degrading to no-op");
                (
                    ActionPlan::no_op(format!(
                        "No usable plan after {} attempt(s)",
                        exchange.attempts
                    )),
                    Outcome::Degraded { error },
                )
            }
            Some(mut plan) => {
                let arguments = std::mem::take(&mut plan.arguments);
                plan.arguments = self.registry.conform(&plan.tool, arguments);
                let outcome = self.validate_and_dispatch(cycle, &plan).await;
                (plan, outcome)
            }
        };

        // ── Recording ──
        self.enter(cycle, CycleStage::Recording);
        let interval = next_interval(&plan, &outcome);
        let record = NewDecision {
            timestamp: Utc::now(),
            goal_id: self.goal.id.clone(),
            context: context.iter().map(ContextRef::from).collect(),
            request: request.into_inner(),
            response: exchange.response,
            plan: plan.clone(),
            outcome: outcome.clone(),
            error: outcome.error().map(str::to_string),
            attempts: exchange.attempts,
            next_interval_secs: interval.as_secs(),
        };
        let decision_id = self.store.record_decision(record).await?;

        info!(
            cycle,
            decision_id = %decision_id,
            tool = %plan.tool,
            outcome = outcome.label(),
            next_in_secs = interval.as_secs(),
            "Decision recorded"
        );
        self.events.publish(DomainEvent::DecisionRecorded {
            decision_id: decision_id.0,
            outcome: outcome.label().to_string(),
            next_interval_secs: interval.as_secs(),
            timestamp: Utc::now(),
        });
        if !outcome.is_success() {
            self.observe(cycle, decision_id, &plan, &outcome).await;
        }

        Ok(CycleReport {
            cycle,
            decision_id,
            plan,
            outcome,
            attempts: exchange.attempts,
            context_size: context.len(),
            next_interval: interval,
        })
    }

    /// Leave a note about a cycle whose plan did not run, so later cycles
    /// see the failure in their context. A failed write is only logged.
    async fn observe(
        &self,
        cycle: u64,
        decision_id: DecisionId,
        plan: &ActionPlan,
        outcome: &Outcome,
    ) {
        let content = format!(
            "Decision {decision_id} {} ({}): {}",
            outcome.label(),
            plan.tool,
            outcome.error().unwrap_or("no detail")
        );
        let note = NewNote::new(ENGINE_CATEGORY, content, ENGINE_SOURCE);
        if let Err(e) = self.store.record_note(note).await {
            warn!(cycle, decision_id = %decision_id, error = %e, "Cannot record engine note");
        }
    }

    /// Ask for a plan, retrying transport failures, timeouts and
    /// unparsable replies with exponential backoff.
    async fn request_plan(&self, cycle: u64, request: &RequestPayload) -> Exchange {
        let retry = &self.settings.retry;
        let mut last_response = None;
        let mut last_error = None;

        for attempt in 1..=retry.attempts() {
            let failure = match tokio::time::timeout(
                retry.attempt_timeout,
                self.reasoner.exchange(request),
            )
            .await
            {
                Ok(Ok(raw)) => match parse_response(&raw) {
                    Ok(plan) => {
                        debug!(cycle, attempt, tool = %plan.tool, "Plan received");
                        return Exchange {
                            plan: Some(plan),
                            response: Some(raw),
                            attempts: attempt,
                            last_error,
                        };
                    }
                    Err(e) => {
                        last_response = Some(raw);
                        (e.to_string(), None)
                    }
                },
                Ok(Err(e)) => (e.to_string(), Some(e)),
                Err(_) => {
                    let e = TransportError::Timeout(retry.attempt_timeout.as_secs());
                    (e.to_string(), Some(e))
                }
            };

            let (message, transport) = failure;
            warn!(cycle, attempt, reasoner = self.reasoner.name(), error = %message, "Reasoning attempt failed");
            self.events.publish(DomainEvent::ReasonerAttemptFailed {
                cycle,
                attempt,
                error: message.clone(),
                timestamp: Utc::now(),
            });
            last_error = Some(message);

            if attempt < retry.attempts() {
                let delay = match &transport {
                    Some(e) => retry.delay_for_error(attempt, e),
                    None => retry.delay_after(attempt),
                };
                debug!(cycle, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::time::sleep(delay).await;
            }
        }

        Exchange {
            plan: None,
            response: last_response,
            attempts: retry.attempts(),
            last_error,
        }
    }

    async fn validate_and_dispatch(&self, cycle: u64, plan: &ActionPlan) -> Outcome {
        self.enter(cycle, CycleStage::Validating);
        if let Err(e) = self.registry.validate(&plan.tool, &plan.arguments) {
            warn!(cycle, tool = %plan.tool, error = %e, "Plan rejected");
            return Outcome::Rejected {
                error: e.to_string(),
            };
        }

        self.enter(cycle, CycleStage::Dispatching);
        let start = Instant::now();
        let result = self
            .registry
            .invoke(&plan.tool, plan.arguments.clone())
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.events.publish(DomainEvent::ToolInvoked {
            tool_name: plan.tool.clone(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(result) => {
                debug!(cycle, tool = %plan.tool, duration_ms, "Tool executed");
                Outcome::Executed {
                    output: result.output,
                    data: result.data,
                }
            }
            Err(e) => Outcome::ToolFailed {
                error: e.to_string(),
            },
        }
    }

    fn enter(&self, cycle: u64, stage: CycleStage) {
        info!(cycle, stage = %stage, "Cycle stage");
        self.events.publish(DomainEvent::StageEntered {
            cycle,
            stage,
            timestamp: Utc::now(),
        });
    }
}
