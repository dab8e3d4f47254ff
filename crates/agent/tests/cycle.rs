//! End-to-end decision cycles against an in-memory store and scripted
//! reasoning service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use goalward_agent::{
    CycleScheduler, DecisionEngine, ENGINE_CATEGORY, EngineSettings, IntervalPolicy, RetryPolicy,
};
use goalward_core::decision::{DecisionId, NO_OP_TOOL, NewDecision, Outcome};
use goalward_core::error::{StorageError, TransportError};
use goalward_core::event::{CycleStage, DomainEvent, EventBus};
use goalward_core::goal::Goal;
use goalward_core::memory::{ContextQuery, MemoryStore, Summary, SummaryPeriod, TimeWindow};
use goalward_core::note::{ENGINE_SOURCE, NewNote, Note, NoteId};
use goalward_core::decision::Decision;
use goalward_core::reasoner::{Reasoner, RequestPayload};
use goalward_memory::InMemoryStore;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ── Test doubles ──────────────────────────────────────────────────────────

/// Replies from a fixed script; fails once the script runs out.
struct ScriptedReasoner {
    script: Mutex<VecDeque<Result<String, TransportError>>>,
    calls: Mutex<usize>,
}

impl ScriptedReasoner {
    fn new(script: Vec<Result<String, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn exchange(&self, _request: &RequestPayload) -> Result<String, TransportError> {
        *self.calls.lock().unwrap() += 1;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("script exhausted".into())))
    }
}

/// Delegates to an in-memory store but refuses to record decisions.
struct FailingStore {
    inner: InMemoryStore,
}

#[async_trait]
impl MemoryStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn record_note(&self, note: NewNote) -> Result<NoteId, StorageError> {
        self.inner.record_note(note).await
    }

    async fn record_decision(&self, _decision: NewDecision) -> Result<DecisionId, StorageError> {
        Err(StorageError::WriteFailed("disk full".into()))
    }

    async fn retrieve_context(&self, query: ContextQuery) -> Result<Vec<Note>, StorageError> {
        self.inner.retrieve_context(query).await
    }

    async fn summarize(
        &self,
        period: SummaryPeriod,
        now: DateTime<Utc>,
    ) -> Result<Summary, StorageError> {
        self.inner.summarize(period, now).await
    }

    async fn rescore(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        self.inner.rescore(now).await
    }

    async fn get_note(&self, id: NoteId) -> Result<Option<Note>, StorageError> {
        self.inner.get_note(id).await
    }

    async fn last_decision(&self) -> Result<Option<Decision>, StorageError> {
        self.inner.last_decision().await
    }

    async fn recent_decisions(&self, limit: usize) -> Result<Vec<Decision>, StorageError> {
        self.inner.recent_decisions(limit).await
    }

    async fn note_count(&self) -> Result<usize, StorageError> {
        self.inner.note_count().await
    }

    async fn decision_count(&self) -> Result<usize, StorageError> {
        self.inner.decision_count().await
    }

    async fn record_summary(&self, summary: &Summary) -> Result<i64, StorageError> {
        self.inner.record_summary(summary).await
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────

fn reply(tool: &str, arguments: &str, next_check: Option<&str>) -> String {
    let hint = next_check
        .map(|h| format!("<next_check>{h}</next_check>"))
        .unwrap_or_default();
    format!(
        "<decision><analysis>steady</analysis><action><tool>{tool}</tool>\
         <arguments>{arguments}</arguments></action>\
         <reasoning>keep going</reasoning>{hint}</decision>"
    )
}

fn note_reply() -> String {
    reply("note_take", r#"{"text":"ran 5km","category":"progress"}"#, None)
}

fn network(msg: &str) -> Result<String, TransportError> {
    Err(TransportError::Network(msg.into()))
}

fn settings(max_attempts: u32) -> EngineSettings {
    EngineSettings {
        context_limit: 10,
        context_window: chrono::Duration::days(7),
        retry: RetryPolicy {
            max_attempts,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(60),
        },
    }
}

fn policy() -> IntervalPolicy {
    IntervalPolicy {
        base: Duration::from_secs(600),
        max_interval: Duration::from_secs(6000),
        backoff_multiplier: 2.0,
        min_hint: Duration::from_secs(300),
        max_hint: Duration::from_secs(86_400),
    }
}

fn engine(
    store: Arc<dyn MemoryStore>,
    reasoner: Arc<ScriptedReasoner>,
    max_attempts: u32,
) -> Arc<DecisionEngine> {
    let registry = goalward_tools::default_registry(
        store.clone(),
        Arc::new(InMemoryStore::new()),
        Duration::from_secs(5),
    )
    .unwrap();
    Arc::new(DecisionEngine::new(
        Goal::new("Run a half marathon").with_id("fitness"),
        store,
        Arc::new(registry),
        reasoner,
        settings(max_attempts),
    ))
}

async fn all_notes(store: &dyn MemoryStore) -> Vec<Note> {
    let window = TimeWindow::ending_at(
        Utc::now() + chrono::Duration::minutes(1),
        chrono::Duration::days(1),
    );
    store
        .retrieve_context(ContextQuery::new(100, window))
        .await
        .unwrap()
}

/// The store holds exactly one note and the engine wrote it.
async fn assert_only_engine_note(store: &dyn MemoryStore, label: &str) -> Note {
    let notes = all_notes(store).await;
    assert_eq!(notes.len(), 1, "{notes:?}");
    let note = notes.into_iter().next().unwrap();
    assert_eq!(note.source, ENGINE_SOURCE);
    assert_eq!(note.category, ENGINE_CATEGORY);
    assert!(note.content.contains(label), "{}", note.content);
    note
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<Arc<DomainEvent>>) -> Vec<Arc<DomainEvent>> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── Engine ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn executed_cycle_runs_tool_and_records_decision() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(note_reply())]));
    let mut scheduler = CycleScheduler::new(engine(store.clone(), reasoner.clone(), 3), policy());

    let report = scheduler.run_once().await.unwrap();
    assert!(matches!(report.outcome, Outcome::Executed { .. }));
    assert_eq!(report.plan.tool, "note_take");
    assert_eq!(report.attempts, 1);
    assert_eq!(report.next_interval, Duration::from_secs(600));

    assert_eq!(store.note_count().await.unwrap(), 1);
    let decision = store.last_decision().await.unwrap().unwrap();
    assert_eq!(decision.id, report.decision_id);
    assert_eq!(decision.record.goal_id, "fitness");
    assert_eq!(decision.record.response.as_deref(), Some(note_reply().as_str()));
    assert!(decision.record.request.starts_with("<request>"));
    assert!(decision.record.error.is_none());
    assert_eq!(reasoner.calls(), 1);
}

#[tokio::test]
async fn stages_are_published_in_order() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(note_reply())]));
    let engine = engine(store, reasoner, 1);
    let mut rx = engine.events().subscribe();

    engine.run_cycle(|_, _| Duration::from_secs(600)).await.unwrap();

    let events = drain(&mut rx);
    let stages: Vec<CycleStage> = events
        .iter()
        .filter_map(|e| match e.as_ref() {
            DomainEvent::StageEntered { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            CycleStage::Gathering,
            CycleStage::Requesting,
            CycleStage::Validating,
            CycleStage::Dispatching,
            CycleStage::Recording,
            CycleStage::Idle,
        ]
    );
    assert!(matches!(events[0].as_ref(), DomainEvent::CycleStarted { cycle: 1, .. }));
    assert!(events.iter().any(|e| matches!(
        e.as_ref(),
        DomainEvent::ToolInvoked { success: true, .. }
    )));
    assert!(events.iter().any(|e| matches!(
        e.as_ref(),
        DomainEvent::DecisionRecorded { .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_record_one_degraded_decision() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        network("connection reset"),
        network("connection reset"),
        network("connection refused"),
    ]));
    let mut scheduler = CycleScheduler::new(engine(store.clone(), reasoner.clone(), 3), policy());

    let started = tokio::time::Instant::now();
    let report = scheduler.run_once().await.unwrap();

    // Backoff of 2s then 4s between the three attempts
    assert!(started.elapsed() >= Duration::from_secs(6));
    assert_eq!(reasoner.calls(), 3);
    assert_eq!(report.attempts, 3);
    assert_eq!(report.plan.tool, NO_OP_TOOL);
    match &report.outcome {
        Outcome::Degraded { error } => assert!(error.contains("connection refused")),
        other => panic!("expected degraded, got {other:?}"),
    }
    assert!(report.next_interval > policy().base);

    assert_eq!(store.decision_count().await.unwrap(), 1);
    let note = assert_only_engine_note(store.as_ref(), "degraded").await;
    assert!(note.content.contains("connection refused"));
    assert_eq!(scheduler.state().consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn unparsable_reply_is_retried() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        Ok("I think you should take a note.".into()),
        Ok(note_reply()),
    ]));
    let engine = engine(store.clone(), reasoner.clone(), 3);
    let mut rx = engine.events().subscribe();

    let report = engine.run_cycle(|_, _| Duration::from_secs(600)).await.unwrap();
    assert!(report.outcome.is_success());
    assert_eq!(report.attempts, 2);
    assert_eq!(reasoner.calls(), 2);

    let failed = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e.as_ref(), DomainEvent::ReasonerAttemptFailed { attempt: 1, .. }))
        .count();
    assert_eq!(failed, 1);
}

#[tokio::test]
async fn unknown_tool_is_rejected_without_running_anything() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(reply("teleport", "{}", None))]));
    let engine = engine(store.clone(), reasoner, 1);
    let mut rx = engine.events().subscribe();

    let report = engine.run_cycle(|_, _| Duration::from_secs(600)).await.unwrap();
    match &report.outcome {
        Outcome::Rejected { error } => assert!(error.contains("teleport")),
        other => panic!("expected rejected, got {other:?}"),
    }

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e.as_ref(), DomainEvent::ToolInvoked { .. })));
    assert_eq!(store.decision_count().await.unwrap(), 1);
    let note = assert_only_engine_note(store.as_ref(), "rejected").await;
    assert!(note.content.contains("teleport"));
}

#[tokio::test]
async fn invalid_arguments_are_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(reply(
        "note_take",
        r#"{"category":"progress"}"#,
        None,
    ))]));
    let mut scheduler = CycleScheduler::new(engine(store.clone(), reasoner, 1), policy());

    let report = scheduler.run_once().await.unwrap();
    assert!(matches!(report.outcome, Outcome::Rejected { .. }));
    // Nothing from note_take, only the engine's own observation
    assert_only_engine_note(store.as_ref(), "rejected (note_take)").await;

    let decision = store.last_decision().await.unwrap().unwrap();
    assert!(decision.record.error.is_some());
    assert_eq!(scheduler.state().consecutive_failures, 1);
    assert_eq!(report.next_interval, Duration::from_secs(1200));
}

#[tokio::test]
async fn tool_failure_is_recorded_as_data() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(reply(
        "calculator",
        r#"{"expression":"1 / 0"}"#,
        None,
    ))]));
    let engine = engine(store.clone(), reasoner, 1);

    let report = engine.run_cycle(|_, _| Duration::from_secs(600)).await.unwrap();
    assert!(matches!(report.outcome, Outcome::ToolFailed { .. }));
    assert_eq!(store.decision_count().await.unwrap(), 1);
    assert_only_engine_note(store.as_ref(), "tool_failed (calculator)").await;
}

#[tokio::test]
async fn numeric_markup_text_is_kept_as_a_string() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(reply(
        "note_take",
        "<text>42</text><category>weight</category>",
        None,
    ))]));
    let engine = engine(store.clone(), reasoner, 1);

    let report = engine.run_cycle(|_, _| Duration::from_secs(600)).await.unwrap();
    assert!(report.outcome.is_success(), "{:?}", report.outcome);
    assert_eq!(report.plan.arguments["text"], "42");

    let notes = all_notes(store.as_ref()).await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "42");
    assert_eq!(notes[0].category, "weight");
}

#[tokio::test]
async fn engine_note_about_a_failure_reaches_the_next_cycle() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        Ok(reply("teleport", "{}", None)),
        Ok(reply("no_op", "{}", None)),
    ]));
    let engine = engine(store.clone(), reasoner, 1);

    let first = engine.run_cycle(|_, _| Duration::from_secs(600)).await.unwrap();
    assert!(matches!(first.outcome, Outcome::Rejected { .. }));
    assert_eq!(first.context_size, 0);

    let second = engine.run_cycle(|_, _| Duration::from_secs(600)).await.unwrap();
    assert!(second.outcome.is_success());
    assert_eq!(second.context_size, 1);
    let decision = store.last_decision().await.unwrap().unwrap();
    assert!(decision.record.request.contains("teleport"));

    // A successful cycle adds no engine note
    assert_eq!(store.note_count().await.unwrap(), 1);
}

#[tokio::test]
async fn context_notes_are_referenced_by_the_decision() {
    let store = Arc::new(InMemoryStore::new());
    let first = store
        .record_note(NewNote::new("progress", "long run 12km", "test"))
        .await
        .unwrap();
    let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(reply("no_op", "{}", None))]));
    let engine = engine(store.clone(), reasoner, 1);

    let report = engine.run_cycle(|_, _| Duration::from_secs(600)).await.unwrap();
    assert_eq!(report.context_size, 1);

    let decision = store.last_decision().await.unwrap().unwrap();
    assert_eq!(decision.record.context.len(), 1);
    assert_eq!(decision.record.context[0].note_id, first);
    assert!(decision.record.request.contains("long run 12km"));
}

#[tokio::test]
async fn concurrent_cycles_on_one_engine_do_not_interleave() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        Ok(note_reply()),
        Ok(note_reply()),
    ]));
    let engine = engine(store.clone(), reasoner, 1);

    let (a, b) = tokio::join!(
        engine.run_cycle(|_, _| Duration::from_secs(600)),
        engine.run_cycle(|_, _| Duration::from_secs(600)),
    );
    let mut cycles = vec![a.unwrap().cycle, b.unwrap().cycle];
    cycles.sort();
    assert_eq!(cycles, vec![1, 2]);
    assert_eq!(store.decision_count().await.unwrap(), 2);
}

// ── Scheduler ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn storage_failure_aborts_cycle_and_counts_as_failure() {
    let store = Arc::new(FailingStore {
        inner: InMemoryStore::new(),
    });
    let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(reply("no_op", "{}", None))]));
    let engine = engine(store.clone(), reasoner, 1);
    let mut rx = engine.events().subscribe();
    let mut scheduler = CycleScheduler::new(engine, policy());

    let err = scheduler.run_once().await.unwrap_err();
    assert!(matches!(err, StorageError::WriteFailed(_)));
    assert_eq!(store.inner.decision_count().await.unwrap(), 0);
    assert_eq!(scheduler.state().consecutive_failures, 1);
    assert_eq!(scheduler.state().next_interval, Duration::from_secs(1200));
    assert_eq!(scheduler.state().cycles_run, 1);

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e.as_ref(), DomainEvent::CycleAborted { .. })));
}

#[tokio::test]
async fn success_after_failures_resets_to_base() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        network("down"),
        network("down"),
        Ok(note_reply()),
    ]));
    let mut scheduler = CycleScheduler::new(engine(store.clone(), reasoner, 1), policy());

    let first = scheduler.run_once().await.unwrap();
    assert_eq!(first.next_interval, Duration::from_secs(1200));
    let second = scheduler.run_once().await.unwrap();
    assert_eq!(second.next_interval, Duration::from_secs(2400));
    assert_eq!(scheduler.state().consecutive_failures, 2);

    let third = scheduler.run_once().await.unwrap();
    assert!(third.outcome.is_success());
    assert_eq!(third.next_interval, Duration::from_secs(600));
    assert_eq!(scheduler.state().consecutive_failures, 0);
    assert_eq!(scheduler.state().cycles_run, 3);
}

#[tokio::test]
async fn in_range_hint_wins_and_out_of_range_hint_is_ignored() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        Ok(reply("no_op", "{}", Some("2 hours"))),
        Ok(reply("no_op", "{}", Some("10s"))),
    ]));
    let mut scheduler = CycleScheduler::new(engine(store, reasoner, 1), policy());

    let hinted = scheduler.run_once().await.unwrap();
    assert_eq!(hinted.next_interval, Duration::from_secs(7200));

    let ignored = scheduler.run_once().await.unwrap();
    assert_eq!(ignored.plan.interval_hint_secs, Some(10));
    assert_eq!(ignored.next_interval, Duration::from_secs(600));
}

#[tokio::test]
async fn restore_resumes_from_last_decision() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        network("down"),
        Ok(reply("no_op", "{}", Some("2 hours"))),
    ]));
    let engine_a = engine(store.clone(), reasoner.clone(), 1);
    let mut before = CycleScheduler::new(engine_a, policy());
    before.run_once().await.unwrap();
    before.run_once().await.unwrap();

    let mut after = CycleScheduler::new(engine(store.clone(), reasoner, 1), policy());
    assert_eq!(after.delay_until_next(Utc::now()), Duration::ZERO);
    after.restore().await.unwrap();

    let state = after.state();
    assert_eq!(state.next_interval, Duration::from_secs(7200));
    assert_eq!(state.consecutive_failures, 0);
    assert_eq!(state.last_decision_id, Some(DecisionId(2)));
    assert!(after.delay_until_next(Utc::now()) > Duration::from_secs(7000));
}

#[tokio::test]
async fn restore_counts_trailing_failures() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        Ok(note_reply()),
        network("down"),
        network("down"),
    ]));
    let mut before = CycleScheduler::new(engine(store.clone(), reasoner.clone(), 1), policy());
    for _ in 0..3 {
        before.run_once().await.unwrap();
    }

    let mut after = CycleScheduler::new(engine(store, reasoner, 1), policy());
    after.restore().await.unwrap();
    assert_eq!(after.state().consecutive_failures, 2);
    assert_eq!(after.state().next_interval, Duration::from_secs(2400));
}

#[tokio::test(start_paused = true)]
async fn run_forever_stops_between_cycles_on_cancel() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![Ok(note_reply())]));
    let bus = Arc::new(EventBus::new(64));
    let registry = goalward_tools::default_registry(
        store.clone(),
        Arc::new(InMemoryStore::new()),
        Duration::from_secs(5),
    )
    .unwrap();
    let engine = Arc::new(
        DecisionEngine::new(
            Goal::new("Run a half marathon").with_id("fitness"),
            store.clone(),
            Arc::new(registry),
            reasoner,
            settings(1),
        )
        .with_event_bus(bus.clone()),
    );
    let mut rx = bus.subscribe();
    let mut scheduler = CycleScheduler::new(engine, policy());

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle = tokio::spawn(async move {
        scheduler.run_forever(token).await;
        scheduler
    });

    loop {
        let event = rx.recv().await.unwrap();
        if matches!(event.as_ref(), DomainEvent::DecisionRecorded { .. }) {
            break;
        }
    }
    cancel.cancel();

    let scheduler = handle.await.unwrap();
    assert_eq!(scheduler.state().cycles_run, 1);
    assert_eq!(store.decision_count().await.unwrap(), 1);
}

#[tokio::test]
async fn cancelled_token_prevents_any_cycle() {
    let store = Arc::new(InMemoryStore::new());
    let reasoner = Arc::new(ScriptedReasoner::new(vec![]));
    let mut scheduler = CycleScheduler::new(engine(store.clone(), reasoner.clone(), 1), policy());

    let cancel = CancellationToken::new();
    cancel.cancel();
    scheduler.run_forever(cancel).await;

    assert_eq!(scheduler.state().cycles_run, 0);
    assert_eq!(reasoner.calls(), 0);
    assert_eq!(store.decision_count().await.unwrap(), 0);
}
