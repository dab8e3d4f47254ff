//! Reply parsing.
//!
//! Expected shape:
//!
//! ```xml
//! <decision>
//!   <analysis>optional</analysis>
//!   <action>
//!     <tool>note_take</tool>
//!     <arguments>{"text": "ran 5km"}</arguments>
//!   </action>
//!   <reasoning>required</reasoning>
//!   <next_check>optional, e.g. 2 hours</next_check>
//! </decision>
//! ```
//!
//! `<action_details>`/`<parameters>` are accepted as aliases, and
//! `<action_type>No Action</action_type>` with no action block selects the
//! no-op tool explicitly.

use goalward_core::decision::{ActionPlan, NO_OP_TOOL};
use goalward_core::error::ParseError;
use serde_json::{Map, Value};
use tracing::warn;

use crate::interval::parse_interval;
use crate::markup::{Element, parse_document, strip_code_fence};

const ROOT: &str = "decision";
const ACTION: &[&str] = &["action", "action_details"];
const ARGUMENTS: &[&str] = &["arguments", "parameters"];

/// Parse the reasoning service's reply into a typed plan.
pub fn parse_response(raw: &str) -> Result<ActionPlan, ParseError> {
    let root = parse_document(strip_code_fence(raw))?;
    if root.name != ROOT {
        return Err(ParseError::UnexpectedRoot(root.name));
    }

    let rationale = root
        .child_text("reasoning")
        .ok_or(ParseError::MissingField("reasoning"))?
        .to_string();
    let analysis = root.child_text("analysis").map(str::to_string);
    let interval_hint_secs = root.child_text("next_check").and_then(|hint| {
        parse_interval(hint)
            .inspect_err(|e| warn!(hint = %hint, error = %e, "Dropping unparsable next_check"))
            .ok()
            .map(|d| d.as_secs())
    });

    let (tool, arguments) = match root.child_any(ACTION) {
        Some(action) => {
            let tool = action
                .child_text("tool")
                .ok_or(ParseError::MissingField("tool"))?
                .to_string();
            let arguments = action
                .child_any(ARGUMENTS)
                .ok_or(ParseError::MissingField("arguments"))
                .and_then(arguments_from)?;
            (tool, arguments)
        }
        None if declines_action(&root) => (NO_OP_TOOL.to_string(), Value::Object(Map::new())),
        None => return Err(ParseError::MissingField("tool")),
    };

    Ok(ActionPlan {
        tool,
        arguments,
        rationale,
        analysis,
        interval_hint_secs,
    })
}

fn declines_action(root: &Element) -> bool {
    root.child_text("action_type").is_some_and(|t| {
        let t = t.to_ascii_lowercase().replace(['_', '-'], " ");
        t == "no action" || t == "none"
    })
}

/// Arguments are either a JSON object body or one child element per argument.
fn arguments_from(element: &Element) -> Result<Value, ParseError> {
    if element.children.is_empty() {
        let body = element.text();
        if body.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        return match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Ok(Value::Object(map)),
            Ok(other) => Err(ParseError::InvalidArguments(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(ParseError::InvalidArguments(format!("invalid JSON: {e}"))),
        };
    }
    Ok(Value::Object(children_to_object(element)))
}

fn children_to_object(element: &Element) -> Map<String, Value> {
    let mut map = Map::new();
    for child in &element.children {
        let value = if child.children.is_empty() {
            scalar_value(child.text())
        } else {
            Value::Object(children_to_object(child))
        };
        // A repeated tag collects into an array
        match map.get_mut(&child.name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(child.name.clone(), value);
            }
        }
    }
    map
}

/// JSON arrays, objects, numbers and booleans are taken as such; anything
/// else (including `null`) stays a string.
fn scalar_value(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(v @ (Value::Array(_) | Value::Object(_) | Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(text.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
