//! Note-taking tool: lets the reasoning service write to memory.

use async_trait::async_trait;
use goalward_core::error::ToolError;
use goalward_core::memory::MemoryStore;
use goalward_core::note::{DEFAULT_CATEGORY, NewNote};
use goalward_core::tool::{Tool, ToolKind, ToolResult};
use std::sync::Arc;
use tracing::debug;

/// Appends a note to the memory store.
pub struct NoteTakeTool {
    store: Arc<dyn MemoryStore>,
}

impl NoteTakeTool {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for NoteTakeTool {
    fn name(&self) -> &str {
        "note_take"
    }

    fn description(&self) -> &str {
        "Record an observation, progress update, or plan in long-term memory. \
         Notes are scored for importance and shown back to you in later cycles."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Memory
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "minLength": 1,
                    "description": "The note content"
                },
                "category": {
                    "type": "string",
                    "description": "Category such as progress, observation or plan (default: general)"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;
        let category = arguments["category"].as_str().unwrap_or(DEFAULT_CATEGORY);

        let note = NewNote::new(category, text, self.name());
        let category = note.category.clone();
        let id = self
            .store
            .record_note(note)
            .await
            .map_err(|e| ToolError::Execution {
                tool: self.name().to_string(),
                cause: e.to_string(),
            })?;

        debug!(note_id = %id, category = %category, "Note taken");
        Ok(ToolResult::text(format!("Recorded note {id} in '{category}'"))
            .with_data(serde_json::json!({ "note_id": id.0, "category": category })))
    }
}
