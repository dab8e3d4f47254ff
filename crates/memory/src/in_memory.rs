//! In-memory backend: useful for testing and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use goalward_core::decision::{Decision, DecisionId, NewDecision};
use goalward_core::error::StorageError;
use goalward_core::memory::{ContextQuery, MemoryStore, Summary, SummaryPeriod};
use goalward_core::note::{NewNote, Note, NoteId};
use goalward_core::todo::{NewTodo, Todo, TodoFilter, TodoId, TodoPatch, TodoStore, list_order};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::scoring::{ScoringPolicy, rank_order};
use crate::summary;

#[derive(Default)]
struct State {
    notes: Vec<Note>,
    decisions: Vec<Decision>,
    summaries: Vec<Summary>,
    todos: Vec<Todo>,
    // Todos can be deleted, so ids do not follow the vector length
    last_todo_id: i64,
}

/// Keeps everything in vectors behind one lock. Nothing survives a restart.
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    policy: ScoringPolicy,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_policy(ScoringPolicy::default())
    }

    pub fn with_policy(policy: ScoringPolicy) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            policy,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn record_note(&self, note: NewNote) -> Result<NoteId, StorageError> {
        // One write guard covers the history read and the append
        let mut state = self.state.write().await;

        let mut history: Vec<&Note> = state
            .notes
            .iter()
            .filter(|n| n.category == note.category)
            .collect();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        let score = self
            .policy
            .score_new(&note, history.iter().map(|n| n.content.as_str()));

        let id = NoteId(state.notes.len() as i64 + 1);
        state.notes.push(Note {
            id,
            timestamp: note.timestamp,
            category: note.category,
            content: note.content,
            source: note.source,
            importance: score.importance,
            category_weight: score.category_weight,
            novelty: score.novelty,
        });
        debug!(note_id = %id, importance = score.importance, "Recorded note");
        Ok(id)
    }

    async fn record_decision(&self, decision: NewDecision) -> Result<DecisionId, StorageError> {
        let mut state = self.state.write().await;
        let id = DecisionId(state.decisions.len() as i64 + 1);
        state.decisions.push(Decision {
            id,
            record: decision,
        });
        Ok(id)
    }

    async fn retrieve_context(&self, query: ContextQuery) -> Result<Vec<Note>, StorageError> {
        let state = self.state.read().await;
        let mut notes: Vec<Note> = state
            .notes
            .iter()
            .filter(|n| query.matches(n))
            .cloned()
            .collect();
        notes.sort_by(rank_order);
        notes.truncate(query.limit);
        Ok(notes)
    }

    async fn summarize(
        &self,
        period: SummaryPeriod,
        now: DateTime<Utc>,
    ) -> Result<Summary, StorageError> {
        let state = self.state.read().await;
        Ok(summary::compute(period, now, &state.notes, &state.decisions))
    }

    async fn rescore(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut state = self.state.write().await;
        for note in state.notes.iter_mut() {
            note.importance = self.policy.rescore(note, now);
        }
        Ok(state.notes.len())
    }

    async fn get_note(&self, id: NoteId) -> Result<Option<Note>, StorageError> {
        let state = self.state.read().await;
        Ok(state.notes.iter().find(|n| n.id == id).cloned())
    }

    async fn last_decision(&self) -> Result<Option<Decision>, StorageError> {
        let state = self.state.read().await;
        Ok(state.decisions.last().cloned())
    }

    async fn recent_decisions(&self, limit: usize) -> Result<Vec<Decision>, StorageError> {
        let state = self.state.read().await;
        Ok(state.decisions.iter().rev().take(limit).cloned().collect())
    }

    async fn note_count(&self) -> Result<usize, StorageError> {
        Ok(self.state.read().await.notes.len())
    }

    async fn decision_count(&self) -> Result<usize, StorageError> {
        Ok(self.state.read().await.decisions.len())
    }

    async fn record_summary(&self, summary: &Summary) -> Result<i64, StorageError> {
        let mut state = self.state.write().await;
        state.summaries.push(summary.clone());
        Ok(state.summaries.len() as i64)
    }
}

#[async_trait]
impl TodoStore for InMemoryStore {
    async fn add_todo(&self, todo: NewTodo) -> Result<TodoId, StorageError> {
        let mut state = self.state.write().await;
        state.last_todo_id += 1;
        let id = TodoId(state.last_todo_id);
        state.todos.push(todo.into_todo(id));
        debug!(todo_id = %id, "Added todo");
        Ok(id)
    }

    async fn update_todo(
        &self,
        id: TodoId,
        patch: TodoPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Todo>, StorageError> {
        let mut state = self.state.write().await;
        Ok(state.todos.iter_mut().find(|t| t.id == id).map(|todo| {
            patch.apply(todo, now);
            todo.clone()
        }))
    }

    async fn list_todos(&self, filter: TodoFilter) -> Result<Vec<Todo>, StorageError> {
        let state = self.state.read().await;
        let mut todos: Vec<Todo> = state
            .todos
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        todos.sort_by(list_order);
        Ok(todos)
    }

    async fn get_todo(&self, id: TodoId) -> Result<Option<Todo>, StorageError> {
        let state = self.state.read().await;
        Ok(state.todos.iter().find(|t| t.id == id).cloned())
    }

    async fn delete_todo(&self, id: TodoId) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        let before = state.todos.len();
        state.todos.retain(|t| t.id != id);
        Ok(state.todos.len() < before)
    }
}
