//! Todo tool: the agent's task list.
//!
//! One tool, six actions selected by `action`: add, update, complete,
//! list, get and delete.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use goalward_core::error::{StorageError, ToolError};
use goalward_core::todo::{NewTodo, Todo, TodoFilter, TodoId, TodoPatch, TodoStatus, TodoStore};
use goalward_core::tool::{Tool, ToolKind, ToolResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const MAX_TITLE_LEN: usize = 200;

pub struct TodoTool {
    store: Arc<dyn TodoStore>,
}

impl TodoTool {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Action {
    Add,
    Update,
    Complete,
    List,
    Get,
    Delete,
}

#[derive(Debug, Deserialize)]
struct TodoArgs {
    action: Action,
    id: Option<i64>,
    title: Option<String>,
    description: Option<String>,
    status: Option<TodoStatus>,
    priority: Option<u8>,
    due_date: Option<NaiveDate>,
    tags: Option<Vec<String>>,
    metadata: Option<serde_json::Value>,
}

impl TodoArgs {
    fn id(&self) -> Result<TodoId, ToolError> {
        self.id
            .map(TodoId)
            .ok_or_else(|| ToolError::InvalidArguments("Missing todo 'id'".into()))
    }

    fn patch(&self) -> TodoPatch {
        TodoPatch {
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
            tags: self.tags.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

fn line(todo: &Todo) -> String {
    let mut line = format!(
        "#{} [{}] p{} {}",
        todo.id, todo.status, todo.priority, todo.title
    );
    if let Some(due) = todo.due_date {
        line.push_str(&format!(" (due {due})"));
    }
    if !todo.tags.is_empty() {
        line.push_str(&format!(" {{{}}}", todo.tags.join(", ")));
    }
    line
}

fn data(todo: &Todo) -> serde_json::Value {
    serde_json::to_value(todo).unwrap_or(serde_json::Value::Null)
}

#[async_trait]
impl Tool for TodoTool {
    fn name(&self) -> &str {
        "todo"
    }

    fn description(&self) -> &str {
        "Manage your task list. `action` is one of add (needs title), update, complete, \
         get or delete (need id), or list (optionally filtered by status, priority and tags). \
         Priority runs from 1 (highest) to 5; due_date is YYYY-MM-DD."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Planning
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["add", "update", "complete", "list", "get", "delete"]
                },
                "id": { "type": "integer", "minimum": 1 },
                "title": { "type": "string", "minLength": 1, "maxLength": MAX_TITLE_LEN },
                "description": { "type": "string" },
                "status": {
                    "type": "string",
                    "enum": ["pending", "in_progress", "completed", "cancelled"]
                },
                "priority": { "type": "integer", "minimum": 1, "maximum": 5 },
                "due_date": { "type": "string", "pattern": "^[0-9]{4}-[0-9]{2}-[0-9]{2}$" },
                "tags": { "type": "array", "items": { "type": "string", "minLength": 1 } },
                "metadata": { "type": "object" }
            },
            "required": ["action"],
            "allOf": [
                {
                    "if": { "properties": { "action": { "const": "add" } } },
                    "then": { "required": ["title"] }
                },
                {
                    "if": {
                        "properties": {
                            "action": { "enum": ["update", "complete", "get", "delete"] }
                        }
                    },
                    "then": { "required": ["id"] }
                }
            ]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: TodoArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let storage = |e: StorageError| ToolError::Execution {
            tool: "todo".into(),
            cause: e.to_string(),
        };
        let not_found = |id: TodoId| ToolError::Execution {
            tool: "todo".into(),
            cause: format!("Todo {id} not found"),
        };

        match args.action {
            Action::Add => {
                let title = args
                    .title
                    .clone()
                    .ok_or_else(|| ToolError::InvalidArguments("Missing 'title'".into()))?;
                let mut todo = NewTodo::new(title);
                todo.description = args.description.clone();
                todo.status = args.status.unwrap_or_default();
                todo.due_date = args.due_date;
                if let Some(priority) = args.priority {
                    todo.priority = priority;
                }
                if let Some(tags) = args.tags.clone() {
                    todo.tags = tags;
                }
                if let Some(metadata) = args.metadata.clone() {
                    todo.metadata = metadata;
                }

                let id = self.store.add_todo(todo).await.map_err(storage)?;
                debug!(todo_id = %id, "Todo added");
                Ok(ToolResult::text(format!("Added todo #{id}"))
                    .with_data(serde_json::json!({ "todo_id": id.0 })))
            }
            Action::Update | Action::Complete => {
                let id = args.id()?;
                let patch = match args.action {
                    Action::Complete => TodoPatch::complete(),
                    _ => args.patch(),
                };
                if patch.is_empty() {
                    return Err(ToolError::InvalidArguments("No fields to update".into()));
                }

                let todo = self
                    .store
                    .update_todo(id, patch, Utc::now())
                    .await
                    .map_err(storage)?
                    .ok_or_else(|| not_found(id))?;
                Ok(ToolResult::text(format!("Updated {}", line(&todo))).with_data(data(&todo)))
            }
            Action::Get => {
                let id = args.id()?;
                let todo = self
                    .store
                    .get_todo(id)
                    .await
                    .map_err(storage)?
                    .ok_or_else(|| not_found(id))?;
                let mut output = line(&todo);
                if let Some(description) = &todo.description {
                    output.push_str(&format!("\n{description}"));
                }
                Ok(ToolResult::text(output).with_data(data(&todo)))
            }
            Action::Delete => {
                let id = args.id()?;
                if !self.store.delete_todo(id).await.map_err(storage)? {
                    return Err(not_found(id));
                }
                Ok(ToolResult::text(format!("Deleted todo #{id}"))
                    .with_data(serde_json::json!({ "todo_id": id.0 })))
            }
            Action::List => {
                let filter = TodoFilter {
                    status: args.status,
                    priority: args.priority,
                    tags: args.tags.clone().unwrap_or_default(),
                };
                let todos = self.store.list_todos(filter).await.map_err(storage)?;
                let output = if todos.is_empty() {
                    "No matching todos.".to_string()
                } else {
                    todos.iter().map(line).collect::<Vec<_>>().join("\n")
                };
                let items: Vec<serde_json::Value> = todos.iter().map(data).collect();
                Ok(ToolResult::text(output).with_data(serde_json::json!({ "todos": items })))
            }
        }
    }
}
