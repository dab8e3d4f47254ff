//! Note search tool: lets the agent look further back than the context
//! it is handed each cycle.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use goalward_core::error::ToolError;
use goalward_core::memory::{ContextQuery, MemoryStore, TimeWindow};
use goalward_core::tool::{Tool, ToolKind, ToolResult};
use serde::Serialize;
use std::sync::Arc;

const DEFAULT_LIMIT: u64 = 5;
const MAX_LIMIT: u64 = 50;
const DEFAULT_HOURS: f64 = 24.0 * 7.0;
const MAX_HOURS: f64 = 24.0 * 365.0 * 10.0;

/// Reads ranked notes back from the memory store.
pub struct NoteSearchTool {
    store: Arc<dyn MemoryStore>,
}

impl NoteSearchTool {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[derive(Debug, Serialize)]
struct NoteHit {
    id: i64,
    timestamp: String,
    category: String,
    content: String,
    importance: f64,
}

#[async_trait]
impl Tool for NoteSearchTool {
    fn name(&self) -> &str {
        "note_search"
    }

    fn description(&self) -> &str {
        "Look up earlier notes, most important first. Optionally filter by category \
         and how many hours back to search."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Information
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "description": "Only return notes in this category"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": MAX_LIMIT,
                    "description": "Maximum number of notes (default 5)"
                },
                "hours": {
                    "type": "number",
                    "exclusiveMinimum": 0,
                    "maximum": MAX_HOURS,
                    "description": "How far back to look, in hours (default 168, at most 87600)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let limit = arguments["limit"]
            .as_u64()
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT) as usize;
        let hours = arguments["hours"]
            .as_f64()
            .unwrap_or(DEFAULT_HOURS)
            .clamp(0.0, MAX_HOURS);
        let span = Duration::try_seconds((hours * 3600.0) as i64)
            .unwrap_or_else(|| Duration::hours(MAX_HOURS as i64));

        let mut query = ContextQuery::new(limit, TimeWindow::ending_at(Utc::now(), span));
        if let Some(category) = arguments["category"].as_str() {
            query = query.with_categories(vec![category.to_string()]);
        }

        let notes = self
            .store
            .retrieve_context(query)
            .await
            .map_err(|e| ToolError::Execution {
                tool: self.name().to_string(),
                cause: e.to_string(),
            })?;

        if notes.is_empty() {
            return Ok(ToolResult::text("No matching notes.")
                .with_data(serde_json::json!({ "notes": [] })));
        }

        let output = notes
            .iter()
            .map(|n| {
                format!(
                    "[{}] ({}, importance {:.2}) {}",
                    n.id, n.category, n.importance, n.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let hits: Vec<NoteHit> = notes
            .into_iter()
            .map(|n| NoteHit {
                id: n.id.0,
                timestamp: n.timestamp.to_rfc3339(),
                category: n.category,
                content: n.content,
                importance: n.importance,
            })
            .collect();

        Ok(ToolResult::text(output).with_data(serde_json::json!({ "notes": hits })))
    }
}
