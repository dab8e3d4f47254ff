//! Request serialization.
//!
//! Output is a pure function of the goal, the context notes and the tool
//! catalog: no clock reads, ordered maps, key-sorted JSON, fixed-precision
//! numbers and timestamps. Identical inputs give identical bytes.

use chrono::{DateTime, SecondsFormat, Utc};
use goalward_core::goal::Goal;
use goalward_core::note::Note;
use goalward_core::reasoner::RequestPayload;
use goalward_core::tool::ToolDefinition;
use serde_json::Value;

use crate::markup::MarkupWriter;

/// Instructions describing the reply format, for a reasoner's system prompt.
pub const RESPONSE_INSTRUCTIONS: &str = r#"You are the planning component of an autonomous agent working toward a goal.
Each request contains the goal, the most important recent notes, and the tools you may use.
Choose exactly one tool. Reply with markup only, no prose and no code fences:

<decision>
  <analysis>How things stand relative to the goal</analysis>
  <action>
    <tool>tool_name</tool>
    <arguments>{"argument": "value"}</arguments>
  </action>
  <reasoning>Why this tool, with these arguments, right now</reasoning>
  <next_check>2 hours</next_check>
</decision>

<arguments> holds a JSON object matching the tool's parameter schema; child elements
such as <text>ran 5km</text> are accepted too. Use the no_op tool when nothing is needed.
<next_check> is optional and accepts forms like 90m, 2 hours or 1 day."#;

/// Serialize one cycle's request.
pub fn build_request(goal: &Goal, context: &[Note], catalog: &[ToolDefinition]) -> RequestPayload {
    let mut w = MarkupWriter::new();
    w.open("request", &[]);

    w.open("goal", &[("id", goal.id.clone())]);
    w.leaf("description", &[], &goal.description);
    if !goal.success_criteria.is_empty() {
        w.open("success_criteria", &[]);
        for criterion in &goal.success_criteria {
            w.leaf("criterion", &[], criterion);
        }
        w.close("success_criteria");
    }
    if !goal.target_metrics.is_empty() {
        w.open("target_metrics", &[]);
        // BTreeMap iteration is already name-ordered
        for (name, target) in &goal.target_metrics {
            w.leaf("metric", &[("name", name.clone())], &canonical_json(target));
        }
        w.close("target_metrics");
    }
    if let Some(due) = goal.due_date {
        w.leaf("due_date", &[], &due.format("%Y-%m-%d").to_string());
    }
    w.close("goal");

    w.open("context", &[("count", context.len().to_string())]);
    for note in context {
        w.leaf(
            "note",
            &[
                ("id", note.id.to_string()),
                ("category", note.category.clone()),
                ("importance", format!("{:.4}", note.importance)),
                ("timestamp", timestamp(&note.timestamp)),
            ],
            &note.content,
        );
    }
    w.close("context");

    w.open("tools", &[]);
    for tool in catalog {
        w.open(
            "tool",
            &[
                ("name", tool.name.clone()),
                ("kind", tool.kind.as_str().to_string()),
            ],
        );
        w.leaf("description", &[], &tool.description);
        w.leaf("parameters", &[], &canonical_json(&tool.parameters));
        w.close("tool");
    }
    w.close("tools");

    w.close("request");
    RequestPayload::new(w.finish())
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
