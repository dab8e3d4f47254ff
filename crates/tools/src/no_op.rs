//! The explicit "nothing to do right now" tool.

use async_trait::async_trait;
use goalward_core::decision::NO_OP_TOOL;
use goalward_core::error::ToolError;
use goalward_core::tool::{Tool, ToolKind, ToolResult};

pub struct NoOpTool;

#[async_trait]
impl Tool for NoOpTool {
    fn name(&self) -> &str {
        NO_OP_TOOL
    }

    fn description(&self) -> &str {
        "Take no action this cycle. Use when progress is on track and nothing needs doing."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Planning
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reason": { "type": "string" }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let output = match arguments["reason"].as_str() {
            Some(reason) if !reason.trim().is_empty() => format!("No action taken: {reason}"),
            _ => "No action taken".to_string(),
        };
        Ok(ToolResult::text(output))
    }
}
