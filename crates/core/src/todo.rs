//! Todos: the agent's own task list, kept beside its notes.
//!
//! Unlike notes and decisions, todos are mutable: the planning tool adds,
//! updates, completes and deletes them across cycles.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

/// Priority given to todos that do not name one (1 is highest).
pub const DEFAULT_PRIORITY: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(pub i64);

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Completed => "completed",
            TodoStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TodoStatus::Pending),
            "in_progress" | "in-progress" => Ok(TodoStatus::InProgress),
            "completed" | "done" => Ok(TodoStatus::Completed),
            "cancelled" | "canceled" => Ok(TodoStatus::Cancelled),
            other => Err(format!("unknown todo status '{other}'")),
        }
    }
}

/// A stored todo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,

    /// 1 (highest) to 5
    pub priority: u8,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,

    /// Set while the status is `Completed`
    pub completed_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
}

/// A request to add a todo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTodo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "empty_object")]
    pub metadata: serde_json::Value,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

impl NewTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TodoStatus::Pending,
            priority: DEFAULT_PRIORITY,
            due_date: None,
            tags: Vec::new(),
            metadata: empty_object(),
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// The stored form under `id`.
    pub fn into_todo(self, id: TodoId) -> Todo {
        let completed_at = (self.status == TodoStatus::Completed).then_some(self.created_at);
        Todo {
            id,
            title: self.title,
            description: self.description,
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
            created_at: self.created_at,
            completed_at,
            tags: self.tags,
            metadata: self.metadata,
        }
    }
}

/// Field changes for an existing todo. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodoPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TodoStatus>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        *self == TodoPatch::default()
    }

    /// Mark as completed.
    pub fn complete() -> Self {
        Self {
            status: Some(TodoStatus::Completed),
            ..Self::default()
        }
    }

    /// Apply to `todo`. Entering `Completed` stamps `completed_at`;
    /// leaving it clears the stamp.
    pub fn apply(&self, todo: &mut Todo, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            todo.title = title.clone();
        }
        if let Some(description) = &self.description {
            todo.description = Some(description.clone());
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            todo.due_date = Some(due_date);
        }
        if let Some(tags) = &self.tags {
            todo.tags = tags.clone();
        }
        if let Some(metadata) = &self.metadata {
            todo.metadata = metadata.clone();
        }
        if let Some(status) = self.status {
            match (todo.status, status) {
                (TodoStatus::Completed, TodoStatus::Completed) => {}
                (_, TodoStatus::Completed) => todo.completed_at = Some(now),
                _ => todo.completed_at = None,
            }
            todo.status = status;
        }
    }
}

/// Which todos to list. Every set field must match; each tag must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodoFilter {
    #[serde(default)]
    pub status: Option<TodoStatus>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TodoFilter {
    pub fn matches(&self, todo: &Todo) -> bool {
        self.status.is_none_or(|s| s == todo.status)
            && self.priority.is_none_or(|p| p == todo.priority)
            && self.tags.iter().all(|tag| todo.tags.contains(tag))
    }
}

/// Listing order: priority first (1 before 5), then newest first.
pub fn list_order(a: &Todo, b: &Todo) -> std::cmp::Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

/// Storage for the todo list.
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn add_todo(&self, todo: NewTodo) -> Result<TodoId, StorageError>;

    /// Apply `patch`; returns the updated todo, or `None` if `id` is unknown.
    async fn update_todo(
        &self,
        id: TodoId,
        patch: TodoPatch,
        now: DateTime<Utc>,
    ) -> Result<Option<Todo>, StorageError>;

    /// Matching todos in [`list_order`].
    async fn list_todos(&self, filter: TodoFilter) -> Result<Vec<Todo>, StorageError>;

    async fn get_todo(&self, id: TodoId) -> Result<Option<Todo>, StorageError>;

    /// Returns whether a todo was removed.
    async fn delete_todo(&self, id: TodoId) -> Result<bool, StorageError>;
}
