//! Cycle scheduler: decides when the engine runs next.
//!
//! The next interval comes from, in order: an in-bounds hint from the plan,
//! exponential backoff while cycles keep failing, or the base interval.

use chrono::{DateTime, Utc};
use goalward_core::decision::DecisionId;
use goalward_core::error::StorageError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{CycleReport, DecisionEngine};

/// Decisions inspected by [`CycleScheduler::restore`] to rebuild the
/// failure streak.
const RESTORE_LOOKBACK: usize = 32;

/// Largest exponent applied to the backoff multiplier.
const MAX_BACKOFF_EXPONENT: i32 = 64;

/// Interval bounds and backoff shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalPolicy {
    pub base: Duration,
    pub max_interval: Duration,
    pub backoff_multiplier: f64,
    /// Hints shorter than this are ignored
    pub min_hint: Duration,
    /// Hints longer than this are ignored
    pub max_hint: Duration,
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(3600),
            max_interval: Duration::from_secs(86_400),
            backoff_multiplier: 2.0,
            min_hint: Duration::from_secs(300),
            max_hint: Duration::from_secs(86_400),
        }
    }
}

impl IntervalPolicy {
    /// Pick the delay before the next cycle.
    pub fn next_interval(&self, hint: Option<Duration>, consecutive_failures: u32) -> Duration {
        if let Some(hint) = hint {
            if hint >= self.min_hint && hint <= self.max_hint {
                return hint;
            }
            debug!(
                hint_secs = hint.as_secs(),
                min_secs = self.min_hint.as_secs(),
                max_secs = self.max_hint.as_secs(),
                "Ignoring out-of-range interval hint"
            );
        }

        if consecutive_failures == 0 {
            return self.base;
        }

        let exponent = consecutive_failures.min(MAX_BACKOFF_EXPONENT as u32) as i32;
        let secs = self.base.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_interval.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_interval
        }
    }
}

/// Scheduler bookkeeping. Owned by a single [`CycleScheduler`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleState {
    pub consecutive_failures: u32,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub next_interval: Duration,
    pub cycles_run: u64,
    pub last_decision_id: Option<DecisionId>,
}

/// Drives a [`DecisionEngine`] on an adaptive timer.
pub struct CycleScheduler {
    engine: Arc<DecisionEngine>,
    policy: IntervalPolicy,
    state: CycleState,
}

impl CycleScheduler {
    pub fn new(engine: Arc<DecisionEngine>, policy: IntervalPolicy) -> Self {
        let state = CycleState {
            next_interval: policy.base,
            ..CycleState::default()
        };
        Self {
            engine,
            policy,
            state,
        }
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn policy(&self) -> &IntervalPolicy {
        &self.policy
    }

    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    /// Rebuild state from the decision log so a restart waits out the
    /// interval chosen before it went down.
    pub async fn restore(&mut self) -> Result<(), StorageError> {
        let store = self.engine.store();
        let Some(last) = store.last_decision().await? else {
            debug!("No recorded decisions, starting fresh");
            return Ok(());
        };

        let recent = store.recent_decisions(RESTORE_LOOKBACK).await?;
        let failures = recent.iter().take_while(|d| !d.is_success()).count() as u32;

        self.state.last_cycle_at = Some(last.record.timestamp);
        self.state.next_interval = last.next_interval();
        self.state.consecutive_failures = failures;
        self.state.last_decision_id = Some(last.id);

        info!(
            decision_id = %last.id,
            last_cycle_at = %last.record.timestamp,
            next_in_secs = last.next_interval().as_secs(),
            consecutive_failures = failures,
            "Scheduler state restored"
        );
        Ok(())
    }

    /// Time left until the next cycle is due. Zero when overdue or when no
    /// cycle has run yet.
    pub fn delay_until_next(&self, now: DateTime<Utc>) -> Duration {
        let Some(last) = self.state.last_cycle_at else {
            return Duration::ZERO;
        };
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        self.state.next_interval.saturating_sub(elapsed)
    }

    /// Run exactly one cycle and update the state from its outcome.
    pub async fn run_once(&mut self) -> Result<CycleReport, StorageError> {
        let failures_so_far = self.state.consecutive_failures;
        let policy = self.policy.clone();

        let result = self
            .engine
            .run_cycle(move |plan, outcome| {
                let failures = if outcome.is_success() {
                    0
                } else {
                    failures_so_far.saturating_add(1)
                };
                policy.next_interval(plan.interval_hint(), failures)
            })
            .await;

        self.state.cycles_run += 1;
        self.state.last_cycle_at = Some(Utc::now());

        match &result {
            Ok(report) => {
                if report.outcome.is_success() {
                    self.state.consecutive_failures = 0;
                } else {
                    self.state.consecutive_failures = failures_so_far.saturating_add(1);
                }
                self.state.next_interval = report.next_interval;
                self.state.last_decision_id = Some(report.decision_id);
            }
            Err(e) => {
                self.state.consecutive_failures = failures_so_far.saturating_add(1);
                self.state.next_interval = self
                    .policy
                    .next_interval(None, self.state.consecutive_failures);
                warn!(
                    error = %e,
                    consecutive_failures = self.state.consecutive_failures,
                    retry_in_secs = self.state.next_interval.as_secs(),
                    "Cycle failed on storage"
                );
            }
        }
        result
    }

    /// Run cycles until `cancel` fires. Cancellation is observed only
    /// between cycles.
    pub async fn run_forever(&mut self, cancel: CancellationToken) {
        info!(goal = %self.engine.goal().id, base_secs = self.policy.base.as_secs(), "Scheduler started");

        loop {
            let delay = self.delay_until_next(Utc::now());
            if !delay.is_zero() {
                info!(sleep_secs = delay.as_secs(), "Waiting for next cycle");
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            // Storage failures are logged by run_once and retried next tick
            if let Ok(report) = self.run_once().await {
                debug!(
                    cycle = report.cycle,
                    outcome = report.outcome.label(),
                    "Cycle complete"
                );
            }
        }

        info!(cycles_run = self.state.cycles_run, "Scheduler stopped");
    }
}
